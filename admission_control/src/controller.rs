//! The two-timescale admission controller.
//!
//! The fast loop watches the minimum queuing latency of each short interval
//! and reacts to violations of the target latency by shrinking its own period
//! and the admission budget. The slow loop aggregates throughput and latency
//! over a longer period, fits a logarithmic throughput curve over the
//! recorded (target latency, throughput) history, and retunes the target
//! latency toward the operating point with the configured marginal
//! throughput/latency trade-off, plus a bounded log-normal exploration draw
//! to escape local optima.
//!
//! All mutable controller state lives behind one registration lock. Submission
//! threads only touch the accumulators under a brief hold; the slow loop's
//! float-heavy fitting runs on a snapshot taken under the lock and writes the
//! result back under a second short acquisition.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use admission_config::AdmissionConfig;
use rand::Rng;
use rand_distr::{Distribution, LogNormal};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, info};
use utils::regression::{self, DataPoint};

use crate::budget::BudgetPolicy;
use crate::diagnostics::{ControllerModelState, IntervalLog, IntervalRecord};
use crate::error::Result;
use crate::hooks::{AdmissionHooks, HookError};
use crate::options::CodelOptions;
use crate::stats::{FastWindow, RegressionHistory, SlowWindow};
use crate::timer::LoopHandle;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// How often the periodic state summary is logged.
const STATE_LOGGING_INTERVAL: Duration = Duration::from_secs(10);

struct ControllerInner {
    opts: CodelOptions,

    target_latency: Duration,
    fast_interval: Duration,
    violation_count: u32,
    budget: i64,

    fast: FastWindow,
    slow: SlowWindow,
    history: RegressionHistory,
    intervals: IntervalLog,

    last_fit: Option<(f64, f64)>,
    last_slow_throughput_mb_s: Option<f64>,
    last_slow_mean_latency_ms: Option<f64>,
    last_logging_time: Instant,

    /// Set when a budget notification fails inside a loop tick; both loops
    /// stop and `shutdown` reports the error.
    failed: Option<HookError>,
}

impl ControllerInner {
    fn new(opts: CodelOptions, now: Instant) -> Self {
        Self {
            target_latency: opts.initial_target_latency,
            fast_interval: opts.initial_fast_interval,
            violation_count: 0,
            budget: opts.initial_budget,
            fast: FastWindow::new(now),
            slow: SlowWindow::new(now, opts.min_budget),
            history: RegressionHistory::new(opts.regression_history_size),
            intervals: IntervalLog::new(opts.interval_log_size),
            last_fit: None,
            last_slow_throughput_mb_s: None,
            last_slow_mean_latency_ms: None,
            last_logging_time: now,
            failed: None,
            opts,
        }
    }

    fn budget_policy(&self) -> BudgetPolicy {
        BudgetPolicy {
            min_budget: self.opts.min_budget,
            increment: self.opts.budget_increment,
        }
    }
}

struct ControlLoops {
    fast: LoopHandle,
    slow: LoopHandle,
}

/// Slow/fast CoDel controller for a storage I/O admission path.
///
/// Constructed with [`SlowFastCodel::new`] inside a tokio runtime; the two
/// control loops run as background tasks until [`SlowFastCodel::shutdown`]
/// (or a failed budget notification) stops them. The submission path feeds it
/// one [`SlowFastCodel::record`] call per completed transaction and receives
/// budget changes through the injected [`AdmissionHooks`].
pub struct SlowFastCodel {
    inner: Mutex<ControllerInner>,
    hooks: Arc<dyn AdmissionHooks>,
    loops: Mutex<Option<ControlLoops>>,
    created_at: Instant,
}

impl std::fmt::Debug for SlowFastCodel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlowFastCodel").finish_non_exhaustive()
    }
}

impl SlowFastCodel {
    /// Validates `opts`, notifies the admission path of the initial budget
    /// (when activated), and starts both control loops.
    ///
    /// Fails if the options are invalid, if no tokio runtime is available to
    /// arm the timers, or if the initial budget notification is rejected.
    pub fn new(opts: CodelOptions, hooks: Arc<dyn AdmissionHooks>) -> Result<Arc<Self>> {
        opts.validate()?;
        Handle::try_current()?;

        let now = Instant::now();
        let activated = opts.activated;
        let initial_budget = opts.initial_budget;

        info!(
            "Initializing slow/fast CoDel admission controller: activated = {activated}, target latency = {:?}, fast interval = {:?}, slow interval = {:?}, budget = {initial_budget}",
            opts.initial_target_latency, opts.initial_fast_interval, opts.slow_interval
        );

        let controller = Arc::new(Self {
            inner: Mutex::new(ControllerInner::new(opts, now)),
            hooks,
            loops: Mutex::new(None),
            created_at: now,
        });

        if activated {
            controller.hooks.budget_changed(initial_budget)?;
        }
        controller.start_loops();
        Ok(controller)
    }

    /// Construct from an [`AdmissionConfig`] (defaults plus env overrides).
    pub fn from_config(config: &AdmissionConfig, hooks: Arc<dyn AdmissionHooks>) -> Result<Arc<Self>> {
        Self::new(CodelOptions::from_config(config), hooks)
    }

    /// Record one transaction: `start_time` is the monotonic enqueue time,
    /// `size_bytes` the transaction size. Called concurrently from many
    /// submission threads; non-blocking beyond a brief lock hold.
    pub fn record(&self, start_time: Instant, size_bytes: u64) {
        let now = Instant::now();
        let latency = now.duration_since(start_time);

        // Query the queue depth before taking the lock so a hook that peeks
        // back at the controller cannot deadlock.
        let inflight = self.hooks.current_inflight();

        let mut inner = self.inner.lock().unwrap();
        inner.fast.record(latency, size_bytes);
        inner.slow.record(latency, size_bytes, inflight);
    }

    /// The current admission budget. Safe to call concurrently.
    pub fn get_budget(&self) -> i64 {
        self.inner.lock().unwrap().budget
    }

    /// The current target latency. Safe to call concurrently.
    pub fn get_target_latency(&self) -> Duration {
        self.inner.lock().unwrap().target_latency
    }

    /// Snapshot of the controller's operating point.
    pub fn model_state(&self) -> ControllerModelState {
        let inner = self.inner.lock().unwrap();
        ControllerModelState {
            activated: inner.opts.activated,
            target_latency: inner.target_latency,
            fast_interval: inner.fast_interval,
            violation_count: inner.violation_count,
            budget: inner.budget,
            regression_history_len: inner.history.len(),
            last_fit: inner.last_fit,
            last_slow_throughput_mb_s: inner.last_slow_throughput_mb_s,
            last_slow_mean_latency_ms: inner.last_slow_mean_latency_ms,
        }
    }

    /// Drain the diagnostic per-interval records collected so far.
    pub fn take_interval_log(&self) -> Vec<IntervalRecord> {
        self.inner.lock().unwrap().intervals.take()
    }

    /// Atomically replace the controller configuration. Pending timer
    /// callbacks are cancelled and joined before the new state is installed,
    /// so no stale callback can observe or mutate replaced state; the loops
    /// are then re-armed with the new periods.
    ///
    /// Invalid options are rejected up front and the previous configuration
    /// stays fully active. A rejected budget notification leaves the loops
    /// stopped and surfaces to the caller.
    pub async fn apply_options(self: &Arc<Self>, opts: CodelOptions) -> Result<()> {
        opts.validate()?;

        self.stop_loops().await;

        let (activated, budget) = {
            let mut inner = self.inner.lock().unwrap();
            *inner = ControllerInner::new(opts, Instant::now());
            (inner.opts.activated, inner.budget)
        };

        if activated {
            self.hooks.budget_changed(budget)?;
        }
        self.start_loops();

        info!("Admission controller reconfigured: activated = {activated}, budget = {budget}");
        Ok(())
    }

    /// Reset the algorithm to its initial state under the currently installed
    /// options (interval, target, budget, history).
    pub async fn reset(self: &Arc<Self>) -> Result<()> {
        let opts = self.inner.lock().unwrap().opts.clone();
        self.apply_options(opts).await
    }

    /// Stop both control loops and wait for them to finish. After this
    /// returns, no callback is running and none will run again. Reports a
    /// budget-notification failure that previously stopped the loops.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop_loops().await;
        let failed = self.inner.lock().unwrap().failed.take();
        match failed {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn start_loops(self: &Arc<Self>) {
        let (fast_delay, slow_delay) = {
            let inner = self.inner.lock().unwrap();
            (inner.fast_interval, inner.opts.slow_interval)
        };

        let weak = Arc::downgrade(self);
        let fast = LoopHandle::spawn("fast", fast_delay, move || {
            let controller = weak.upgrade()?;
            controller.fast_tick()
        });

        let weak = Arc::downgrade(self);
        let slow = LoopHandle::spawn("slow", slow_delay, move || {
            let controller = weak.upgrade()?;
            controller.slow_tick()
        });

        *self.loops.lock().unwrap() = Some(ControlLoops { fast, slow });
    }

    async fn stop_loops(&self) {
        let loops = self.loops.lock().unwrap().take();
        if let Some(ControlLoops { fast, slow }) = loops {
            fast.cancel_and_join().await;
            slow.cancel_and_join().await;
        }
    }

    fn mark_failed(&self, err: HookError) {
        error!("Stopping admission control loops: {err}");
        self.inner.lock().unwrap().failed = Some(err);
    }

    /// One fast-loop iteration. Returns the delay until the next iteration,
    /// or `None` to stop the loop.
    fn fast_tick(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut notification = None;

        let next_delay = {
            let mut inner = self.inner.lock().unwrap();
            if inner.failed.is_some() {
                return None;
            }

            let drained = inner.fast.drain(now);
            if drained.count == 0 {
                // Idle interval: re-arm unchanged, no violation logic.
                return Some(inner.fast_interval);
            }
            let Some(min_latency) = drained.min_latency else {
                return Some(inner.fast_interval);
            };

            if inner.opts.activated {
                let policy = inner.budget_policy();
                let old_budget = inner.budget;

                if min_latency > inner.target_latency {
                    inner.violation_count += 1;
                    inner.fast_interval = shrunken_interval(
                        inner.opts.initial_fast_interval,
                        inner.violation_count,
                        inner.opts.min_fast_interval,
                    );
                    inner.budget = policy.shrink_on_violation(old_budget, inner.target_latency, min_latency);
                    debug!(
                        "Latency violation #{}: min latency {:?} over target {:?}; fast interval now {:?}",
                        inner.violation_count, min_latency, inner.target_latency, inner.fast_interval
                    );
                } else {
                    inner.violation_count = 0;
                    inner.fast_interval = inner.opts.initial_fast_interval;
                    let max_queue_length = inner.slow.max_queue_length();
                    inner.budget = policy.grow_on_no_violation(old_budget, max_queue_length);
                }

                if inner.budget != old_budget {
                    debug!(
                        "Admission budget adjusted from {} to {} (min latency {:?}, target {:?})",
                        old_budget, inner.budget, min_latency, inner.target_latency
                    );
                    notification = Some(policy.clamp(inner.budget));
                }
            }

            let budget = inner.budget;
            let target_latency = inner.target_latency;
            inner.intervals.push(IntervalRecord {
                interval_start: drained.started_at.duration_since(self.created_at),
                interval_end: now.duration_since(self.created_at),
                bytes: drained.bytes,
                budget,
                target_latency,
            });

            if now.duration_since(inner.last_logging_time) > STATE_LOGGING_INTERVAL {
                inner.last_logging_time = now;
                info!(
                    "Admission control state: budget = {}, target latency = {:?}, violation count = {}, history = {}/{}",
                    inner.budget,
                    inner.target_latency,
                    inner.violation_count,
                    inner.history.len(),
                    inner.opts.regression_history_size
                );
            }

            Some(inner.fast_interval)
        };

        // Notify outside the lock; a rejected notification stops the loops.
        if let Some(new_budget) = notification {
            if let Err(err) = self.hooks.budget_changed(new_budget) {
                self.mark_failed(err);
                return None;
            }
        }
        next_delay
    }

    /// One slow-loop iteration. Closes the slow window, appends to the
    /// regression history, and (once the history is full) retunes the
    /// target latency.
    fn slow_tick(&self) -> Option<Duration> {
        let now = Instant::now();

        let (next_delay, fit_job) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.failed.is_some() {
                return None;
            }

            let next_delay = inner.opts.slow_interval;
            let queue_seed = inner.opts.min_budget;
            let drained = inner.slow.drain(now, queue_seed);
            if drained.count == 0 {
                // Idle interval: counters were reset by the drain, nothing to fit.
                return Some(next_delay);
            }

            let elapsed = now.duration_since(drained.started_at);
            if elapsed.is_zero() {
                return Some(next_delay);
            }

            let throughput_mb_s = drained.bytes as f64 / elapsed.as_secs_f64() / BYTES_PER_MB;
            let mean_latency_ms = drained.sum_latency.as_secs_f64() * 1e3 / drained.count as f64;
            inner.last_slow_throughput_mb_s = Some(throughput_mb_s);
            inner.last_slow_mean_latency_ms = Some(mean_latency_ms);
            debug!(
                "Slow interval closed: {} txc, {:.3} MB/s, mean latency {:.3} ms, target {:?}",
                drained.count, throughput_mb_s, mean_latency_ms, inner.target_latency
            );

            if !(inner.opts.activated && inner.opts.adaptive_target) {
                return Some(next_delay);
            }

            let target_ms = inner.target_latency.as_secs_f64() * 1e3;
            inner.history.push(target_ms, throughput_mb_s);
            if !inner.history.is_full() {
                // Too little history to fit; the target stays where it is.
                return Some(next_delay);
            }

            let job = FitJob {
                points: inner.history.snapshot(),
                opts: inner.opts.clone(),
            };
            (next_delay, job)
        };

        // Fit and noise draw run on the snapshot, outside the lock.
        let Some((fit, new_target_ms)) = retune_target(&fit_job) else {
            return Some(next_delay);
        };

        {
            let mut inner = self.inner.lock().unwrap();
            let old_target = inner.target_latency;
            inner.last_fit = Some(fit);
            inner.target_latency = Duration::from_secs_f64(new_target_ms / 1e3)
                .clamp(inner.opts.min_target_latency, inner.opts.max_target_latency);
            if inner.target_latency != old_target {
                debug!(
                    "Retuned target latency from {:?} to {:?} (fit slope {:.4})",
                    old_target, inner.target_latency, fit.1
                );
            }
        }
        Some(next_delay)
    }
}

struct FitJob {
    points: Vec<(f64, f64)>,
    opts: CodelOptions,
}

/// Fits the logarithmic throughput curve over the history and derives the
/// next target latency (in ms): the point where the curve's local slope
/// equals the configured trade-off, clamped, with a bounded log-normal
/// exploration draw around it. Returns `None` to skip the cycle on a
/// degenerate fit.
fn retune_target(job: &FitJob) -> Option<((f64, f64), f64)> {
    let opts = &job.opts;
    let mut points: Vec<DataPoint> = job
        .points
        .iter()
        .map(|&(time, value)| DataPoint { time, value })
        .collect();

    if opts.throughput_outlier_rejection {
        let inliers = regression::reject_outliers(&points);
        if inliers.len() >= 2 {
            points = inliers;
        }
    }

    let xs: Vec<f64> = points.iter().map(|p| p.time).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();
    let (intercept, slope) = match regression::log_fit(&xs, &ys) {
        Ok(theta) => theta,
        Err(err) => {
            debug!("Skipping target retune this cycle: {err}");
            return None;
        },
    };

    let min_ms = opts.min_target_latency.as_secs_f64() * 1e3;
    let max_ms = opts.max_target_latency.as_secs_f64() * 1e3;
    let predicted = regression::target_for_slope(slope, opts.target_slope).clamp(min_ms, max_ms);

    // Exploration: log-normal draw with its mode on the regression
    // prediction, support bounded above by predicted * multiplier.
    let (mu, sigma) = regression::log_normal_noise_params(predicted, predicted * opts.noise_bound_multiplier);
    let mut rng = rand::thread_rng();
    let mut target = match LogNormal::new(mu, sigma) {
        Ok(dist) => dist.sample(&mut rng),
        Err(_) => predicted,
    };
    if target < predicted {
        // An undershooting draw is pulled back up by a random fraction of the
        // deficit so exploration does not collapse toward the floor.
        target += rng.gen::<f64>() * (predicted - target);
    }
    if !target.is_finite() {
        return None;
    }

    Some(((intercept, slope), target.clamp(min_ms, max_ms)))
}

/// `initial / round(sqrt(violation_count))`, floored at `floor` so sustained
/// violations never degenerate into a busy spin.
fn shrunken_interval(initial: Duration, violation_count: u32, floor: Duration) -> Duration {
    let divisor = (violation_count as f64).sqrt().round().max(1.0);
    initial.div_f64(divisor).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrunken_interval_follows_sqrt_schedule() {
        let initial = Duration::from_millis(60);
        let floor = Duration::from_micros(1);

        assert_eq!(shrunken_interval(initial, 1, floor), initial);
        assert_eq!(shrunken_interval(initial, 2, floor), initial);
        assert_eq!(shrunken_interval(initial, 4, floor), Duration::from_millis(30));
        assert_eq!(shrunken_interval(initial, 9, floor), Duration::from_millis(20));
        assert_eq!(shrunken_interval(initial, 100, floor), Duration::from_millis(6));
    }

    #[test]
    fn shrunken_interval_clamps_to_floor() {
        let initial = Duration::from_micros(10);
        let floor = Duration::from_micros(2);
        assert_eq!(shrunken_interval(initial, 1_000_000, floor), floor);
    }

    #[test]
    fn retune_skips_on_degenerate_history() {
        // All targets identical: the log fit has no spread to work with.
        let job = FitJob {
            points: vec![(5.0, 100.0), (5.0, 110.0), (5.0, 90.0)],
            opts: CodelOptions::default(),
        };
        assert!(retune_target(&job).is_none());
    }

    #[test]
    fn retune_stays_within_clamp_range() {
        let opts = CodelOptions::default();
        let min_ms = opts.min_target_latency.as_secs_f64() * 1e3;
        let max_ms = opts.max_target_latency.as_secs_f64() * 1e3;

        // Throughput rising in latency: a well-formed log curve.
        let points: Vec<(f64, f64)> = (1..=20)
            .map(|i| {
                let target = i as f64;
                (target, 40.0 + 12.0 * target.ln())
            })
            .collect();

        for _ in 0..50 {
            let job = FitJob {
                points: points.clone(),
                opts: opts.clone(),
            };
            let (_, target_ms) = retune_target(&job).unwrap();
            assert!(target_ms >= min_ms && target_ms <= max_ms, "target {target_ms} out of range");
        }
    }

    #[test]
    fn retune_recovers_known_operating_point_without_noise() {
        // With the noise multiplier at 1.0 the draw degenerates to the
        // prediction itself: y = 2 + 8 ln(x) and slope 1 puts the target at 8.
        let opts = CodelOptions {
            target_slope: 1.0,
            noise_bound_multiplier: 1.0,
            ..Default::default()
        };
        let points: Vec<(f64, f64)> = (1..=20).map(|i| (i as f64, 2.0 + 8.0 * (i as f64).ln())).collect();

        let job = FitJob { points, opts };
        let ((intercept, slope), target_ms) = retune_target(&job).unwrap();
        assert!((intercept - 2.0).abs() < 1e-6);
        assert!((slope - 8.0).abs() < 1e-6);
        assert!((target_ms - 8.0).abs() < 1e-6);
    }
}
