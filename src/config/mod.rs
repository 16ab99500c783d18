//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → Config (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; runtime changes go through the admin API
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, CacheConfig, CircuitBreakerConfig, Config, FeaturesConfig, GeoBlockingConfig,
    LoadBalancingConfig, MonitoringConfig, SecurityConfig, ServerConfig, UserAgentBlockingConfig,
};
pub use validation::{validate_config, ValidationError};
