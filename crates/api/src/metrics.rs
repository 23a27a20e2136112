use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use pipeline::RunStatistics;

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_link_time_us: AtomicU64,

    // Counts
    total_entities: AtomicUsize,
    total_linked: AtomicUsize,
    total_cache_hits: AtomicUsize,
    total_relationships: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_link_time_us: AtomicU64::new(0),
            total_entities: AtomicUsize::new(0),
            total_linked: AtomicUsize::new(0),
            total_cache_hits: AtomicUsize::new(0),
            total_relationships: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_run(&self, duration: Duration, stats: &RunStatistics) {
        self.total_link_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_entities.fetch_add(stats.entities, Ordering::Relaxed);
        self.total_linked.fetch_add(stats.linked, Ordering::Relaxed);
        self.total_cache_hits.fetch_add(stats.cache_hits, Ordering::Relaxed);
        self.total_relationships
            .fetch_add(stats.relationships.dedup.after_validity, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let total_time = self.total_link_time_us.load(Ordering::Relaxed) as f64;
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: successful,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_link_time_ms: if successful > 0 {
                total_time / successful as f64 / 1000.0
            } else {
                0.0
            },
            total_entities: self.total_entities.load(Ordering::Relaxed),
            total_linked: self.total_linked.load(Ordering::Relaxed),
            total_cache_hits: self.total_cache_hits.load(Ordering::Relaxed),
            total_relationships: self.total_relationships.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_link_time_ms: f64,
    pub total_entities: usize,
    pub total_linked: usize,
    pub total_cache_hits: usize,
    pub total_relationships: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::LinkMode;

    #[test]
    fn test_snapshot_aggregates_runs() {
        let metrics = Metrics::new();
        let mut stats = RunStatistics::new("run".to_string(), LinkMode::Extraction, chrono::Utc::now());
        stats.entities = 4;
        stats.linked = 3;
        stats.cache_hits = 2;

        metrics.record_request(true);
        metrics.record_run(Duration::from_millis(10), &stats);
        metrics.record_request(true);
        metrics.record_run(Duration::from_millis(30), &stats);
        metrics.record_request(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.total_entities, 8);
        assert_eq!(snapshot.total_linked, 6);
        assert!((snapshot.avg_link_time_ms - 20.0).abs() < 1e-6);
    }
}
