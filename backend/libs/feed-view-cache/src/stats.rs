//! Statistics tracking for view cache operations

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewCacheStats {
    pub fetches_issued: u64,
    pub fetches_skipped: u64,
    pub fetch_errors: u64,
    pub pages_appended: u64,
    pub stale_commits_dropped: u64,
    pub duplicate_items: u64,
    pub propagations: u64,
    pub items_rewritten: u64,
    pub mutation_errors: u64,
    pub fetch_latency_p50_ms: f64,
    pub fetch_latency_p99_ms: f64,
}

/// Thread-safe statistics collector
#[derive(Clone)]
pub struct StatsCollector {
    fetches_issued: Arc<AtomicU64>,
    fetches_skipped: Arc<AtomicU64>,
    fetch_errors: Arc<AtomicU64>,
    pages_appended: Arc<AtomicU64>,
    stale_commits_dropped: Arc<AtomicU64>,
    duplicate_items: Arc<AtomicU64>,
    propagations: Arc<AtomicU64>,
    items_rewritten: Arc<AtomicU64>,
    mutation_errors: Arc<AtomicU64>,
    latencies: Arc<parking_lot::Mutex<Vec<f64>>>,
    max_samples: usize,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl StatsCollector {
    pub fn new(max_samples: usize) -> Self {
        Self {
            fetches_issued: Arc::new(AtomicU64::new(0)),
            fetches_skipped: Arc::new(AtomicU64::new(0)),
            fetch_errors: Arc::new(AtomicU64::new(0)),
            pages_appended: Arc::new(AtomicU64::new(0)),
            stale_commits_dropped: Arc::new(AtomicU64::new(0)),
            duplicate_items: Arc::new(AtomicU64::new(0)),
            propagations: Arc::new(AtomicU64::new(0)),
            items_rewritten: Arc::new(AtomicU64::new(0)),
            mutation_errors: Arc::new(AtomicU64::new(0)),
            latencies: Arc::new(parking_lot::Mutex::new(Vec::new())),
            max_samples: max_samples.max(2),
        }
    }

    pub fn record_fetch(&self) {
        self.fetches_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.fetches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page(&self) {
        self.pages_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_commit(&self) {
        self.stale_commits_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicates(&self, count: usize) {
        self.duplicate_items
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_propagation(&self, items_rewritten: usize) {
        self.propagations.fetch_add(1, Ordering::Relaxed);
        self.items_rewritten
            .fetch_add(items_rewritten as u64, Ordering::Relaxed);
    }

    pub fn record_mutation_error(&self) {
        self.mutation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, latency: Duration) {
        let mut latencies = self.latencies.lock();
        latencies.push(latency.as_secs_f64() * 1000.0);
        // Keep the newest half once the window is full
        if latencies.len() > self.max_samples {
            let excess = latencies.len() - self.max_samples / 2;
            latencies.drain(0..excess);
        }
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> ViewCacheStats {
        let (p50, p99) = {
            let mut latencies = self.latencies.lock().clone();
            if latencies.is_empty() {
                (0.0, 0.0)
            } else {
                latencies.sort_by(|a, b| a.total_cmp(b));
                let last = latencies.len() - 1;
                let p50_idx = (latencies.len() as f64 * 0.50) as usize;
                let p99_idx = (latencies.len() as f64 * 0.99) as usize;
                (latencies[p50_idx.min(last)], latencies[p99_idx.min(last)])
            }
        };

        ViewCacheStats {
            fetches_issued: self.fetches_issued.load(Ordering::Relaxed),
            fetches_skipped: self.fetches_skipped.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            pages_appended: self.pages_appended.load(Ordering::Relaxed),
            stale_commits_dropped: self.stale_commits_dropped.load(Ordering::Relaxed),
            duplicate_items: self.duplicate_items.load(Ordering::Relaxed),
            propagations: self.propagations.load(Ordering::Relaxed),
            items_rewritten: self.items_rewritten.load(Ordering::Relaxed),
            mutation_errors: self.mutation_errors.load(Ordering::Relaxed),
            fetch_latency_p50_ms: p50,
            fetch_latency_p99_ms: p99,
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        for counter in [
            &self.fetches_issued,
            &self.fetches_skipped,
            &self.fetch_errors,
            &self.pages_appended,
            &self.stale_commits_dropped,
            &self.duplicate_items,
            &self.propagations,
            &self.items_rewritten,
            &self.mutation_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.latencies.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_collector() {
        let stats = StatsCollector::default();

        stats.record_fetch();
        stats.record_fetch();
        stats.record_skip();
        stats.record_fetch_error();
        stats.record_propagation(3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.fetches_issued, 2);
        assert_eq!(snapshot.fetches_skipped, 1);
        assert_eq!(snapshot.fetch_errors, 1);
        assert_eq!(snapshot.propagations, 1);
        assert_eq!(snapshot.items_rewritten, 3);
    }

    #[test]
    fn test_latency_percentiles() {
        let stats = StatsCollector::default();

        for i in 1..=100 {
            stats.record_latency(Duration::from_millis(i));
        }

        let snapshot = stats.snapshot();
        assert!(snapshot.fetch_latency_p50_ms >= 50.0 && snapshot.fetch_latency_p50_ms <= 52.0);
        assert!(snapshot.fetch_latency_p99_ms >= 99.0);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let stats = StatsCollector::new(10);
        for i in 0..25 {
            stats.record_latency(Duration::from_millis(i));
        }
        assert!(stats.latencies.lock().len() <= 10);
    }

    #[test]
    fn test_reset() {
        let stats = StatsCollector::default();
        stats.record_fetch();
        stats.record_latency(Duration::from_millis(5));
        stats.reset();

        assert_eq!(stats.snapshot(), ViewCacheStats::default());
    }
}
