//! In-process request counters backing `/admin/stats`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
struct MinuteBucket {
    minute: u64,
    requests: u64,
    errors: u64,
}

/// Global totals plus a ring of per-minute buckets.
#[derive(Debug)]
pub struct MetricsCollector {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_latency_nanos: AtomicU64,
    minutes: Mutex<Vec<MinuteBucket>>,
}

/// Derived view returned by [`MetricsCollector::snapshot`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub error_rate_percent: f64,
    pub avg_latency_ms: f64,
    pub requests_per_minute: u64,
    pub errors_per_minute: u64,
}

fn current_minute() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 60
}

impl MetricsCollector {
    /// Collector keeping `retention_minutes` per-minute buckets (at least one).
    pub fn new(retention_minutes: usize) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_latency_nanos: AtomicU64::new(0),
            minutes: Mutex::new(vec![MinuteBucket::default(); retention_minutes.max(1)]),
        }
    }

    pub fn record_request(&self, latency: Duration, is_error: bool) {
        self.record_at(current_minute(), latency, is_error);
    }

    fn record_at(&self, minute: u64, latency: Duration, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.total_latency_nanos.fetch_add(nanos, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }

        let mut minutes = self.minutes.lock().expect("metrics ring mutex poisoned");
        let slot = (minute % minutes.len() as u64) as usize;
        let bucket = &mut minutes[slot];
        if bucket.minute != minute {
            *bucket = MinuteBucket {
                minute,
                ..MinuteBucket::default()
            };
        }
        bucket.requests += 1;
        if is_error {
            bucket.errors += 1;
        }
    }

    /// Counts recorded during `minute`, if it is still in the ring.
    fn minute_counts(&self, minute: u64) -> (u64, u64) {
        let minutes = self.minutes.lock().expect("metrics ring mutex poisoned");
        let bucket = minutes[(minute % minutes.len() as u64) as usize];
        if bucket.minute == minute {
            (bucket.requests, bucket.errors)
        } else {
            (0, 0)
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_at(current_minute())
    }

    fn snapshot_at(&self, minute: u64) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_errors = self.total_errors.load(Ordering::Relaxed);
        let total_latency = self.total_latency_nanos.load(Ordering::Relaxed);

        let (avg_latency_ms, error_rate_percent) = if total_requests > 0 {
            (
                total_latency as f64 / total_requests as f64 / 1_000_000.0,
                total_errors as f64 / total_requests as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        let (requests_per_minute, errors_per_minute) = self.minute_counts(minute);

        MetricsSnapshot {
            total_requests,
            total_errors,
            error_rate_percent,
            avg_latency_ms,
            requests_per_minute,
            errors_per_minute,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(60)
    }
}
