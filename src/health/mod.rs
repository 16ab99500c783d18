//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every backend concurrently
//!     → Backend::set_alive
//!
//! Passive signals (proxy module):
//!     Upstream failure / 5xx observed
//!     → circuit breaker on the backend
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary and stored separately
//! - Health state is per-backend, not per-pool

pub mod active;

pub use active::HealthMonitor;
