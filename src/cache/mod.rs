//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! GET request passing policy.rs::is_cacheable
//!     → response.rs lookup by "METHOD:path?query"
//!     → hit: replay stored bytes and headers with 200
//!     → miss: proxy, then store a 200 response for RESPONSE_CACHE_TTL
//! ```
//!
//! # Design Decisions
//! - In-process map behind one RwLock; nothing survives a restart
//! - Expired entries are never served and are swept by the cleanup loop

pub mod policy;
pub mod response;

pub use policy::{cache_key, is_cacheable, RESPONSE_CACHE_TTL};
pub use response::{CacheManager, CachedResponse};
