//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!     → collector.rs (in-process totals for /admin/stats)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint
//!     → Admin API
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)
//! - The Prometheus recorder is optional; facade calls are no-ops without it

pub mod collector;
pub mod logging;
pub mod metrics;

pub use collector::{MetricsCollector, MetricsSnapshot};
