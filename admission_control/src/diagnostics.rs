//! Read-only introspection: a serializable snapshot of the controller's
//! model state and an optional bounded log of per-fast-interval records for
//! external CSV export. Presentation only; nothing here feeds back into the
//! control logic.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Snapshot of the controller's current operating point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerModelState {
    pub activated: bool,
    pub target_latency: Duration,
    pub fast_interval: Duration,
    pub violation_count: u32,
    pub budget: i64,
    pub regression_history_len: usize,
    /// `(intercept, slope)` of the last successful throughput fit, if any.
    pub last_fit: Option<(f64, f64)>,
    pub last_slow_throughput_mb_s: Option<f64>,
    pub last_slow_mean_latency_ms: Option<f64>,
}

/// One closed fast interval. Times are offsets from controller creation so
/// records serialize cleanly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub interval_start: Duration,
    pub interval_end: Duration,
    pub bytes: u64,
    pub budget: i64,
    pub target_latency: Duration,
}

#[derive(Debug)]
pub(crate) struct IntervalLog {
    records: VecDeque<IntervalRecord>,
    capacity: usize,
}

impl IntervalLog {
    /// Capacity 0 disables collection.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: IntervalRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn take(&mut self) -> Vec<IntervalRecord> {
        self.records.drain(..).collect()
    }
}
