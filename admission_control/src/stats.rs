//! Per-interval accumulators. Both windows live behind the controller's
//! registration lock; every method here assumes the caller already holds it,
//! which is what makes a drain atomic with respect to concurrent recording.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Statistics for the current fast interval. Only the minimum matters for the
/// violation check; bytes are kept for the diagnostic interval log.
#[derive(Debug)]
pub(crate) struct FastWindow {
    started_at: Instant,
    min_latency: Option<Duration>,
    count: u64,
    bytes: u64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FastStats {
    pub started_at: Instant,
    pub min_latency: Option<Duration>,
    pub count: u64,
    pub bytes: u64,
}

impl FastWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            min_latency: None,
            count: 0,
            bytes: 0,
        }
    }

    pub fn record(&mut self, latency: Duration, size_bytes: u64) {
        // Strict less-than: ties keep the earlier-recorded value.
        match self.min_latency {
            Some(min) if latency >= min => {},
            _ => self.min_latency = Some(latency),
        }
        self.count += 1;
        self.bytes += size_bytes;
    }

    /// Returns the aggregate and resets the window so the next interval
    /// starts at `now`.
    pub fn drain(&mut self, now: Instant) -> FastStats {
        let stats = FastStats {
            started_at: self.started_at,
            min_latency: self.min_latency,
            count: self.count,
            bytes: self.bytes,
        };
        *self = Self::new(now);
        stats
    }
}

/// Statistics for the current slow interval, including the deepest queue
/// depth the admission path reported while it was open.
#[derive(Debug)]
pub(crate) struct SlowWindow {
    started_at: Instant,
    sum_latency: Duration,
    count: u64,
    bytes: u64,
    max_queue_length: i64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SlowStats {
    pub started_at: Instant,
    pub sum_latency: Duration,
    pub count: u64,
    pub bytes: u64,
}

impl SlowWindow {
    /// `queue_length_seed` is the floor the queue-depth maximum restarts
    /// from; growth is capped relative to this value until traffic raises it.
    pub fn new(now: Instant, queue_length_seed: i64) -> Self {
        Self {
            started_at: now,
            sum_latency: Duration::ZERO,
            count: 0,
            bytes: 0,
            max_queue_length: queue_length_seed,
        }
    }

    pub fn record(&mut self, latency: Duration, size_bytes: u64, inflight: i64) {
        self.sum_latency += latency;
        self.count += 1;
        self.bytes += size_bytes;
        if inflight > self.max_queue_length {
            self.max_queue_length = inflight;
        }
    }

    pub fn max_queue_length(&self) -> i64 {
        self.max_queue_length
    }

    pub fn drain(&mut self, now: Instant, queue_length_seed: i64) -> SlowStats {
        let stats = SlowStats {
            started_at: self.started_at,
            sum_latency: self.sum_latency,
            count: self.count,
            bytes: self.bytes,
        };
        *self = Self::new(now, queue_length_seed);
        stats
    }
}

/// Bounded FIFO of (target latency in ms, throughput in MB/s) observations,
/// single-writer from the slow loop.
#[derive(Debug)]
pub(crate) struct RegressionHistory {
    points: VecDeque<(f64, f64)>,
    capacity: usize,
}

impl RegressionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, target_latency_ms: f64, throughput_mb_s: f64) {
        self.points.push_back((target_latency_ms, throughput_mb_s));
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// The regression update only activates on a full history; fitting on
    /// fewer points chases noise.
    pub fn is_full(&self) -> bool {
        self.points.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn snapshot(&self) -> Vec<(f64, f64)> {
        self.points.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fast_window_min_is_strict() {
        let mut window = FastWindow::new(Instant::now());
        window.record(Duration::from_millis(5), 100);
        window.record(Duration::from_millis(5), 200);
        window.record(Duration::from_millis(7), 300);

        let stats = window.drain(Instant::now());
        assert_eq!(stats.min_latency, Some(Duration::from_millis(5)));
        assert_eq!(stats.count, 3);
        assert_eq!(stats.bytes, 600);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_window_drain_resets() {
        let mut window = FastWindow::new(Instant::now());
        window.record(Duration::from_millis(3), 10);
        let _ = window.drain(Instant::now());

        let stats = window.drain(Instant::now());
        assert_eq!(stats.min_latency, None);
        assert_eq!(stats.count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_window_accepts_zero_sized_records() {
        let mut window = FastWindow::new(Instant::now());
        window.record(Duration::from_millis(1), 0);

        let stats = window.drain(Instant::now());
        assert_eq!(stats.count, 1);
        assert_eq!(stats.bytes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_window_tracks_queue_depth_above_seed() {
        let mut window = SlowWindow::new(Instant::now(), 1000);
        window.record(Duration::from_millis(1), 10, 500);
        assert_eq!(window.max_queue_length(), 1000);

        window.record(Duration::from_millis(1), 10, 2500);
        assert_eq!(window.max_queue_length(), 2500);

        let stats = window.drain(Instant::now(), 1000);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.sum_latency, Duration::from_millis(2));
        assert_eq!(window.max_queue_length(), 1000);
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = RegressionHistory::new(3);
        for i in 0..5 {
            history.push(i as f64, 10.0 * i as f64);
        }
        assert!(history.is_full());
        assert_eq!(history.len(), 3);
        assert_eq!(history.snapshot(), vec![(2.0, 20.0), (3.0, 30.0), (4.0, 40.0)]);
    }

    #[test]
    fn history_not_full_before_capacity() {
        let mut history = RegressionHistory::new(4);
        history.push(1.0, 1.0);
        history.push(2.0, 2.0);
        assert!(!history.is_full());
    }
}
