use std::time::Duration;

use admission_config::AdmissionConfig;

use crate::error::{ControllerError, Result};

/// Validated controller tunables. Built from [`AdmissionConfig`] (or by hand
/// in tests) and installed atomically: an options set that fails
/// [`CodelOptions::validate`] is rejected before anything is replaced, so the
/// previously installed options remain active.
#[derive(Debug, Clone)]
pub struct CodelOptions {
    pub activated: bool,
    pub adaptive_target: bool,
    pub initial_fast_interval: Duration,
    pub min_fast_interval: Duration,
    pub slow_interval: Duration,
    pub initial_target_latency: Duration,
    pub min_target_latency: Duration,
    pub max_target_latency: Duration,
    pub initial_budget: i64,
    pub min_budget: i64,
    pub budget_increment: i64,
    pub target_slope: f64,
    pub regression_history_size: usize,
    pub throughput_outlier_rejection: bool,
    pub noise_bound_multiplier: f64,
    pub interval_log_size: usize,
}

impl CodelOptions {
    pub fn from_config(config: &AdmissionConfig) -> Self {
        let c = &config.controller;
        Self {
            activated: c.activated,
            adaptive_target: c.adaptive_target,
            initial_fast_interval: c.initial_fast_interval,
            min_fast_interval: c.min_fast_interval,
            slow_interval: c.slow_interval,
            initial_target_latency: c.initial_target_latency,
            min_target_latency: c.min_target_latency,
            max_target_latency: c.max_target_latency,
            initial_budget: c.initial_budget,
            min_budget: c.min_budget,
            budget_increment: c.budget_increment,
            target_slope: c.target_slope,
            regression_history_size: c.regression_history_size,
            throughput_outlier_rejection: c.throughput_outlier_rejection,
            noise_bound_multiplier: c.noise_bound_multiplier,
            interval_log_size: c.interval_log_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        fn reject(msg: impl Into<String>) -> Result<()> {
            Err(ControllerError::InvalidConfig(msg.into()))
        }

        if self.initial_fast_interval.is_zero() || self.slow_interval.is_zero() {
            return reject("intervals must be positive");
        }
        if self.min_fast_interval.is_zero() {
            return reject("min_fast_interval must be positive");
        }
        if self.min_fast_interval > self.initial_fast_interval {
            return reject("min_fast_interval exceeds initial_fast_interval");
        }
        if self.min_target_latency.is_zero() {
            return reject("min_target_latency must be positive");
        }
        if self.min_target_latency > self.max_target_latency {
            return reject(format!(
                "min_target_latency {:?} exceeds max_target_latency {:?}",
                self.min_target_latency, self.max_target_latency
            ));
        }
        if self.initial_target_latency < self.min_target_latency
            || self.initial_target_latency > self.max_target_latency
        {
            return reject("initial_target_latency outside [min_target_latency, max_target_latency]");
        }
        if self.min_budget <= 0 {
            return reject("min_budget must be positive");
        }
        if self.initial_budget < self.min_budget {
            return reject("initial_budget below min_budget");
        }
        if self.budget_increment < 0 {
            return reject("budget_increment must be non-negative");
        }
        if !(self.target_slope > 0.0) {
            return reject("target_slope must be positive");
        }
        if !(self.noise_bound_multiplier >= 1.0) {
            return reject("noise_bound_multiplier must be at least 1.0");
        }
        if self.regression_history_size < 2 {
            return reject("regression_history_size must be at least 2");
        }
        Ok(())
    }
}

impl Default for CodelOptions {
    fn default() -> Self {
        Self::from_config(&AdmissionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        CodelOptions::default().validate().unwrap();
    }

    #[test]
    fn inverted_target_range_rejected() {
        let opts = CodelOptions {
            min_target_latency: Duration::from_millis(100),
            max_target_latency: Duration::from_millis(10),
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn zero_interval_rejected() {
        let opts = CodelOptions {
            initial_fast_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn budget_below_floor_rejected() {
        let opts = CodelOptions {
            initial_budget: 10,
            min_budget: 100,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn tiny_history_rejected() {
        let opts = CodelOptions {
            regression_history_size: 1,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
