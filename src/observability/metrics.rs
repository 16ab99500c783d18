//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): total requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_rejections_total` (counter): requests refused by the security layer
//! - `proxy_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `proxy_cache_lookups_total` (counter): cache hits and misses
//! - `proxy_cache_entries` (gauge): live cache size after a sweep
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Histogram buckets tuned for typical web latencies

use std::time::Duration;

use metrics::Label;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the global Prometheus recorder and return the render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("proxy_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, backend: &str, elapsed: Duration) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("backend", backend.to_string()),
    ];
    metrics::counter!("proxy_requests_total", labels.clone()).increment(1);
    metrics::histogram!("proxy_request_duration_seconds", labels).record(elapsed.as_secs_f64());
}

/// Record a request refused before reaching a backend.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("proxy_rejections_total", "reason" => reason).increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    metrics::gauge!("proxy_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("proxy_cache_entries").set(entries as f64);
}
