use std::time::Duration;

crate::config_group!("controller", {

    /// Master enable for the admission controller. When false the controller
    /// still accumulates interval statistics but issues no violations and no
    /// budget adjustments.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_ACTIVATED` to set this value.
    ref activated: bool = false;

    /// Enable the slow-loop regression retuning of the target latency. When
    /// false the fast loop runs against the initial target unchanged.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_ADAPTIVE_TARGET` to set this value.
    ref adaptive_target: bool = true;

    /// Base period of the fast control loop. Under sustained violations the
    /// loop shrinks its own period below this value.
    ///
    /// The default value is 50ms.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_INITIAL_FAST_INTERVAL` to set this value.
    ref initial_fast_interval: Duration = Duration::from_millis(50);

    /// Floor for the shrunken fast interval, preventing a busy-spin when the
    /// violation count grows large.
    ///
    /// The default value is 1us.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_MIN_FAST_INTERVAL` to set this value.
    ref min_fast_interval: Duration = Duration::from_micros(1);

    /// Fixed period of the slow control loop that retunes the target latency.
    ///
    /// The default value is 500ms.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_SLOW_INTERVAL` to set this value.
    ref slow_interval: Duration = Duration::from_millis(500);

    /// Target queuing latency the controller starts with before the slow loop
    /// has enough history to retune it.
    ///
    /// The default value is 5ms.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_INITIAL_TARGET_LATENCY` to set this value.
    ref initial_target_latency: Duration = Duration::from_millis(5);

    /// Lower clamp for the adaptive target latency.
    ///
    /// The default value is 1ms.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_MIN_TARGET_LATENCY` to set this value.
    ref min_target_latency: Duration = Duration::from_millis(1);

    /// Upper clamp for the adaptive target latency.
    ///
    /// The default value is 200ms.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_MAX_TARGET_LATENCY` to set this value.
    ref max_target_latency: Duration = Duration::from_millis(200);

    /// Admission budget (bytes in flight) the controller starts with.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_INITIAL_BUDGET` to set this value.
    ref initial_budget: i64 = 100 * 1024;

    /// Floor for the admission budget; violations never shrink the budget
    /// below this value.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_MIN_BUDGET` to set this value.
    ref min_budget: i64 = 10 * 1024;

    /// Additive budget growth applied on each violation-free fast interval.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_BUDGET_INCREMENT` to set this value.
    ref budget_increment: i64 = 1024;

    /// Desired marginal throughput-per-latency trade-off slope. The slow loop
    /// steers the target latency to the point where the fitted throughput
    /// curve has this local slope.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_TARGET_SLOPE` to set this value.
    ref target_slope: f64 = 1.0;

    /// Capacity of the (target latency, throughput) regression history. The
    /// regression update only activates once the history is full.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_REGRESSION_HISTORY_SIZE` to set this value.
    ref regression_history_size: usize = 100;

    /// Apply z-score outlier rejection to the throughput history before
    /// fitting the regression curve.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_THROUGHPUT_OUTLIER_REJECTION` to set this value.
    ref throughput_outlier_rejection: bool = false;

    /// Upper bound of the exploration noise support, as a multiple of the
    /// regression-predicted target.
    ///
    /// The default value is 2.0.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_NOISE_BOUND_MULTIPLIER` to set this value.
    ref noise_bound_multiplier: f64 = 2.0;

    /// Capacity of the per-fast-interval diagnostic record log. Zero disables
    /// diagnostic collection entirely.
    ///
    /// Use the environment variable `ADMCTL_CONTROLLER_INTERVAL_LOG_SIZE` to set this value.
    ref interval_log_size: usize = 0;
});
