//! Rolling latency statistics (spec.md §5 "statistics buffer"), capped at
//! 1000 entries. Grounded on the teacher's `IndexState` atomic counters,
//! generalized from plain counters to a capped ring since percentiles need
//! the underlying samples, not just a running sum.

use std::collections::VecDeque;

use parking_lot::Mutex;

pub const CAPACITY: usize = 1000;

pub struct RollingStats {
    samples: Mutex<VecDeque<f64>>,
}

impl Default for RollingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingStats {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(CAPACITY)),
        }
    }

    pub fn record(&self, latency_ms: f64) {
        let mut guard = self.samples.lock();
        if guard.len() == CAPACITY {
            guard.pop_front();
        }
        guard.push_back(latency_ms);
    }

    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn mean(&self) -> Option<f64> {
        let guard = self.samples.lock();
        if guard.is_empty() {
            return None;
        }
        Some(guard.iter().sum::<f64>() / guard.len() as f64)
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        let guard = self.samples.lock();
        if guard.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = guard.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(sorted[rank.min(sorted.len() - 1)])
    }

    pub fn p95(&self) -> Option<f64> {
        self.percentile(95.0)
    }

    pub fn summary(&self) -> StatSummary {
        StatSummary {
            count: self.count(),
            mean_ms: self.mean(),
            p95_ms: self.p95(),
        }
    }
}

/// Snapshot of one `RollingStats` ring, taken without holding its lock
/// beyond the read (spec.md §6.1 `stats() -> SearchStats`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatSummary {
    pub count: usize,
    pub mean_ms: Option<f64>,
    pub p95_ms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_mean_and_p95() {
        let stats = RollingStats::new();
        for i in 1..=100 {
            stats.record(i as f64);
        }
        assert_eq!(stats.count(), 100);
        assert!((stats.mean().unwrap() - 50.5).abs() < 1e-9);
        assert!(stats.p95().unwrap() >= 94.0);
    }

    #[test]
    fn caps_at_capacity_dropping_oldest() {
        let stats = RollingStats::new();
        for i in 0..(CAPACITY + 10) {
            stats.record(i as f64);
        }
        assert_eq!(stats.count(), CAPACITY);
        // Oldest 10 samples (0..10) should have been evicted.
        assert!(stats.percentile(0.0).unwrap() >= 10.0);
    }

    #[test]
    fn empty_stats_report_none() {
        let stats = RollingStats::new();
        assert!(stats.mean().is_none());
        assert!(stats.p95().is_none());
    }
}
