//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every backend address parses as a target
//! - Validate value ranges (weights, timeouts, thresholds > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::time::Duration;

use crate::config::schema::Config;
use crate::load_balancer::Target;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::new("backends", "at least one backend is required"));
    }

    for (i, backend) in config.backends.iter().enumerate() {
        let field = format!("backends[{}]", i);
        if let Err(e) = Target::parse(&backend.address) {
            errors.push(ValidationError::new(format!("{}.address", field), e.to_string()));
        }
        if backend.weight == 0 {
            errors.push(ValidationError::new(format!("{}.weight", field), "must be greater than 0"));
        }
        non_zero(&mut errors, &format!("{}.timeout", field), backend.timeout);
    }

    let security = &config.security;
    if security.ddos_threshold == 0 {
        errors.push(ValidationError::new("security.ddos_threshold", "must be greater than 0"));
    }
    if security.max_tracked_ips == 0 {
        errors.push(ValidationError::new("security.max_tracked_ips", "must be greater than 0"));
    }
    non_zero(&mut errors, "security.window_size", security.window_size);
    non_zero(&mut errors, "security.ban_duration", security.ban_duration);

    let lb = &config.load_balancing;
    non_zero(&mut errors, "load_balancing.health_check_interval", lb.health_check_interval);
    if lb.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "load_balancing.circuit_breaker.failure_threshold",
            "must be greater than 0",
        ));
    }

    if config.server.bind_address().parse::<std::net::SocketAddr>().is_err()
        && !config.server.port.contains(':')
    {
        errors.push(ValidationError::new("server.port", "not a valid port or host:port"));
    }

    if config.monitoring.metrics_retention_minutes == 0 {
        errors.push(ValidationError::new(
            "monitoring.metrics_retention_minutes",
            "must be greater than 0",
        ));
    }
    if config.monitoring.enable_metrics {
        let endpoint = config.monitoring.prometheus_endpoint.as_str();
        if !endpoint.starts_with('/') {
            errors.push(ValidationError::new(
                "monitoring.prometheus_endpoint",
                "must start with '/'",
            ));
        } else if endpoint == "/health" || endpoint.starts_with("/admin") {
            errors.push(ValidationError::new(
                "monitoring.prometheus_endpoint",
                "collides with a built-in route",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn non_zero(errors: &mut Vec<ValidationError>, field: &str, value: Duration) {
    if value.is_zero() {
        errors.push(ValidationError::new(field, "must be greater than 0"));
    }
}
