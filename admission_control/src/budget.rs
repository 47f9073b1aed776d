//! Admission-budget adjustment policy: multiplicative shrink proportional to
//! the violation magnitude, additive growth bounded by the queue depth the
//! traffic has actually exercised.

use std::time::Duration;

/// Largest fraction of the budget a single violation may remove.
const MAX_ERROR_RATIO: f64 = 0.5;

/// Budget growth stops once the budget reaches this multiple of the deepest
/// observed queue length for the current slow interval.
const QUEUE_HEADROOM: f64 = 1.5;

#[derive(Debug, Clone, Copy)]
pub(crate) struct BudgetPolicy {
    pub min_budget: i64,
    pub increment: i64,
}

impl BudgetPolicy {
    /// Multiplicative shrink: the error ratio measures how far the interval's
    /// minimum latency overshot the target, capped at [`MAX_ERROR_RATIO`].
    pub fn shrink_on_violation(&self, budget: i64, target: Duration, min_latency: Duration) -> i64 {
        let min_latency_ns = min_latency.as_nanos() as f64;
        let target_ns = target.as_nanos() as f64;
        let error_ratio = ((target_ns - min_latency_ns).abs() / min_latency_ns).min(MAX_ERROR_RATIO);
        let shrunk = (budget as f64 * (1.0 - error_ratio)) as i64;
        self.clamp(shrunk)
    }

    /// Additive growth, capped at `QUEUE_HEADROOM ×` the deepest queue length
    /// observed this slow interval. A budget already at or above the cap is
    /// left alone; the no-violation path never shrinks.
    pub fn grow_on_no_violation(&self, budget: i64, max_queue_length: i64) -> i64 {
        let cap = (max_queue_length as f64 * QUEUE_HEADROOM) as i64;
        if budget >= cap {
            return budget;
        }
        self.clamp((budget + self.increment).min(cap))
    }

    pub fn clamp(&self, budget: i64) -> i64 {
        budget.max(self.min_budget)
    }
}

#[cfg(test)]
mod tests {
    use more_asserts::{assert_ge, assert_le, assert_lt};

    use super::*;

    const POLICY: BudgetPolicy = BudgetPolicy {
        min_budget: 10 * 1024,
        increment: 1024,
    };

    #[test]
    fn shrink_uses_overshoot_ratio() {
        // min latency 125ms vs target 100ms: ratio |100-125|/125 = 0.2.
        let new = POLICY.shrink_on_violation(
            100_000,
            Duration::from_millis(100),
            Duration::from_millis(125),
        );
        assert_eq!(new, 80_000);
    }

    #[test]
    fn shrink_ratio_capped_at_half() {
        // Overshoot far beyond 2x the target still removes at most half.
        let new = POLICY.shrink_on_violation(
            100_000,
            Duration::from_millis(10),
            Duration::from_millis(1000),
        );
        assert_eq!(new, 50_000);
    }

    #[test]
    fn shrink_never_goes_below_floor() {
        let mut budget = 20 * 1024;
        for _ in 0..100 {
            budget = POLICY.shrink_on_violation(
                budget,
                Duration::from_millis(10),
                Duration::from_millis(30),
            );
            assert_ge!(budget, POLICY.min_budget);
        }
        assert_eq!(budget, POLICY.min_budget);
    }

    #[test]
    fn growth_is_additive_up_to_cap() {
        let max_queue = 100_000;
        let cap = 150_000;

        let mut budget = 140_000;
        budget = POLICY.grow_on_no_violation(budget, max_queue);
        assert_eq!(budget, 141_000);

        // Walk to the cap and stop there.
        for _ in 0..100 {
            budget = POLICY.grow_on_no_violation(budget, max_queue);
            assert_le!(budget, cap);
        }
        assert_eq!(budget, cap);
    }

    #[test]
    fn growth_skipped_above_cap_without_shrinking() {
        let budget = 200_000;
        assert_eq!(POLICY.grow_on_no_violation(budget, 100_000), budget);
    }

    #[test]
    fn zero_latency_violation_saturates() {
        // A degenerate zero min latency yields an infinite raw ratio; the cap
        // keeps the shrink at one half.
        let new = POLICY.shrink_on_violation(100_000, Duration::from_millis(10), Duration::ZERO);
        assert_eq!(new, 50_000);
        assert_lt!(new, 100_000);
    }
}
