//! Numeric routines backing the adaptive target-latency model: ordinary
//! least squares, z-score outlier filtering, a closed-form logarithmic fit,
//! and the parameterization of the log-normal exploration distribution.
//!
//! All routines here are pure functions of their inputs so they can be unit
//! tested without any controller state.

use thiserror::Error;

/// Sentinel slope returned when the x values of a series have zero variance.
/// Saturating instead of dividing by zero keeps callers on a slope-comparison
/// code path without a special case.
pub const DEGENERATE_SLOPE: f64 = 1e6;

/// Z value placing the upper end of the exploration distribution's support at
/// the 99th percentile.
const UPPER_TAIL_Z: f64 = 2.33;

/// A single (time, value) observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub time: f64,
    pub value: f64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegressionError {
    #[error("Gram matrix is singular; the x values are degenerate")]
    SingularFit,

    #[error("Need at least {required} points for a fit, got {actual}")]
    NotEnoughPoints { required: usize, actual: usize },
}

/// Ordinary-least-squares slope of `value` against `time`:
/// `Sxy / Sxx` with `Sxy = Σxy − n·x̄·ȳ` and `Sxx = Σx² − n·x̄²`.
///
/// Returns [`DEGENERATE_SLOPE`] when all times are identical (`Sxx == 0`).
pub fn slope(points: &[DataPoint]) -> f64 {
    let n = points.len() as f64;
    if points.is_empty() {
        return DEGENERATE_SLOPE;
    }

    let mut x_sum = 0.0;
    let mut y_sum = 0.0;
    let mut xy_sum = 0.0;
    let mut xx_sum = 0.0;
    for p in points {
        x_sum += p.time;
        y_sum += p.value;
        xy_sum += p.time * p.value;
        xx_sum += p.time * p.time;
    }
    let x_mean = x_sum / n;
    let y_mean = y_sum / n;

    let ss_xy = xy_sum - n * x_mean * y_mean;
    let ss_xx = xx_sum - n * x_mean * x_mean;
    if ss_xx == 0.0 {
        return DEGENERATE_SLOPE;
    }
    ss_xy / ss_xx
}

/// Mean and population standard deviation of `values`.
///
/// Empty input yields `(0.0, 0.0)`.
pub fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Returns the low-deviation subset of `points`: every point whose `value`
/// z-score magnitude is strictly below 2. Operates on a copy; the input is
/// never mutated.
///
/// With zero standard deviation every point is an inlier.
pub fn reject_outliers(points: &[DataPoint]) -> Vec<DataPoint> {
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let (mean, std_dev) = mean_and_std_dev(&values);

    points
        .iter()
        .filter(|p| {
            let z_score = if std_dev != 0.0 { (p.value - mean) / std_dev } else { 0.0 };
            z_score.abs() < 2.0
        })
        .copied()
        .collect()
}

/// Fits `y ≈ θ0 + θ1·ln(x)` by solving the 2×2 normal equations in closed
/// form. Requires every `x` to be strictly positive.
///
/// Fails with [`RegressionError::SingularFit`] when the Gram matrix is
/// singular, i.e. all x values collapse to the same log value.
pub fn log_fit(xs: &[f64], ys: &[f64]) -> Result<(f64, f64), RegressionError> {
    debug_assert_eq!(xs.len(), ys.len());
    debug_assert!(xs.iter().all(|&x| x > 0.0));

    let n = xs.len();
    if n < 2 {
        return Err(RegressionError::NotEnoughPoints { required: 2, actual: n });
    }

    // Gram matrix of the design [1, ln x] and the right-hand side.
    let mut l_sum = 0.0;
    let mut ll_sum = 0.0;
    let mut y_sum = 0.0;
    let mut ly_sum = 0.0;
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let l = x.ln();
        l_sum += l;
        ll_sum += l * l;
        y_sum += y;
        ly_sum += l * y;
    }

    let n = n as f64;
    let det = n * ll_sum - l_sum * l_sum;
    if det.abs() < f64::EPSILON * n * n {
        return Err(RegressionError::SingularFit);
    }

    let intercept = (ll_sum * y_sum - l_sum * ly_sum) / det;
    let slope = (n * ly_sum - l_sum * y_sum) / det;
    Ok((intercept, slope))
}

/// On the curve `y = θ0 + θ1·ln(x)` the local slope is `θ1 / x`. Solves
/// `θ1 / x = desired_slope` for x, the operating point trading
/// `desired_slope` units of throughput per unit of latency.
///
/// `desired_slope` must be nonzero; callers validate this at configuration
/// time.
pub fn target_for_slope(theta1: f64, desired_slope: f64) -> f64 {
    theta1 / desired_slope
}

/// Derives `(μ, σ)` of a log-normal distribution whose mode equals `mode` and
/// whose 99th percentile lands at `max`.
///
/// From `mode = exp(μ − σ²)` and `exp(μ + z·σ) = max` with z = 2.33:
/// `σ² + z·σ − ln(max / mode) = 0`, taking the non-negative root.
///
/// Saturation policy: when `max <= mode` (no room above the mode) or `mode`
/// is non-positive, the distribution degenerates to a point mass at `mode`
/// (`σ = 0`).
pub fn log_normal_noise_params(mode: f64, max: f64) -> (f64, f64) {
    if mode <= 0.0 {
        return (f64::MIN_POSITIVE.ln(), 0.0);
    }
    if max <= mode {
        return (mode.ln(), 0.0);
    }

    let range = (max / mode).ln();
    let sigma = (-UPPER_TAIL_Z + (UPPER_TAIL_Z * UPPER_TAIL_Z + 4.0 * range).sqrt()) / 2.0;
    let mu = mode.ln() + sigma * sigma;
    (mu, sigma)
}

#[cfg(test)]
mod tests {
    use more_asserts::{assert_gt, assert_lt};

    use super::*;

    fn points(pairs: &[(f64, f64)]) -> Vec<DataPoint> {
        pairs.iter().map(|&(time, value)| DataPoint { time, value }).collect()
    }

    #[test]
    fn slope_recovers_linear_data() {
        let pts = points(&[(1.0, 3.0), (2.0, 5.0), (3.0, 7.0), (4.0, 9.0)]);
        assert!((slope(&pts) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn slope_saturates_on_constant_x() {
        let pts = points(&[(5.0, 1.0), (5.0, 2.0), (5.0, 3.0)]);
        assert_eq!(slope(&pts), DEGENERATE_SLOPE);
    }

    #[test]
    fn mean_and_std_dev_population() {
        let (mean, std_dev) = mean_and_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std_dev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn reject_outliers_keeps_low_deviation_set() {
        // One point far above the cluster; z > 2 for it, z < 2 for the rest.
        let mut pairs: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 10.0 + (i % 3) as f64)).collect();
        pairs.push((20.0, 1000.0));
        let kept = reject_outliers(&points(&pairs));

        assert_eq!(kept.len(), 20);
        assert!(kept.iter().all(|p| p.value < 100.0));
    }

    #[test]
    fn reject_outliers_zero_variance_keeps_everything() {
        let pts = points(&[(0.0, 5.0), (1.0, 5.0), (2.0, 5.0)]);
        assert_eq!(reject_outliers(&pts).len(), 3);
    }

    #[test]
    fn log_fit_round_trip() {
        let (a, b) = (3.5, -1.25);
        let xs: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| a + b * x.ln()).collect();

        let (intercept, slope) = log_fit(&xs, &ys).unwrap();
        assert!((intercept - a).abs() < 1e-9);
        assert!((slope - b).abs() < 1e-9);
    }

    #[test]
    fn log_fit_rejects_degenerate_x() {
        let xs = [4.0, 4.0, 4.0];
        let ys = [1.0, 2.0, 3.0];
        assert_eq!(log_fit(&xs, &ys), Err(RegressionError::SingularFit));
    }

    #[test]
    fn log_fit_rejects_short_input() {
        assert_eq!(
            log_fit(&[1.0], &[1.0]),
            Err(RegressionError::NotEnoughPoints { required: 2, actual: 1 })
        );
    }

    #[test]
    fn target_for_slope_solves_derivative() {
        // y = 2 + 6 ln x has slope 6/x; slope == 3 at x == 2.
        assert!((target_for_slope(6.0, 3.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn noise_params_place_mode_and_tail() {
        let (mode, max) = (10.0, 25.0);
        let (mu, sigma) = log_normal_noise_params(mode, max);

        assert_gt!(sigma, 0.0);
        // Mode of LogNormal(mu, sigma) is exp(mu - sigma^2).
        assert!(((mu - sigma * sigma).exp() - mode).abs() < 1e-9);
        // 99th percentile is exp(mu + z * sigma).
        assert!(((mu + 2.33 * sigma).exp() - max).abs() < 1e-6);
        assert_lt!((mu - sigma * sigma).exp(), max);
    }

    #[test]
    fn noise_params_saturate_without_headroom() {
        let (mu, sigma) = log_normal_noise_params(10.0, 10.0);
        assert_eq!(sigma, 0.0);
        assert!((mu - 10.0_f64.ln()).abs() < 1e-12);

        let (_, sigma) = log_normal_noise_params(10.0, 5.0);
        assert_eq!(sigma, 0.0);
    }
}
