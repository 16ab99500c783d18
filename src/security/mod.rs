//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → manager.rs (ban table check)
//!     → filters.rs (user-agent and country blocking)
//!     → manager.rs (sliding-window DDoS check, sub-second DoS gate)
//!     → signature.rs (HMAC verification when a signature header is present)
//!     → challenge.rs (JS proof-of-work snippet on request)
//!     → Pass to cache / backend selection
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Ban and rate-limit tables each sit behind one RwLock
//! - The tracked-IP table is bounded; the stalest entry is evicted

pub mod challenge;
pub mod filters;
pub mod manager;
pub mod rate_limit;
pub mod signature;

pub use challenge::JsChallenge;
pub use filters::{FilterReason, RequestFilter};
pub use manager::SecurityManager;
pub use signature::HmacVerifier;
