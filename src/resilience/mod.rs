//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → backend timeout bounds the upstream call (proxy/forward.rs)
//!     → outcome reported to circuit_breaker.rs
//!     → repeated failures open the circuit, excluding the backend from selection
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No automatic retries; the caller decides whether to retry a 502/503
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
