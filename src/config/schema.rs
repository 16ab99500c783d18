//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from the JSON config file.
//! Duration fields use human-readable strings ("30s", "5m", "500ms").

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::load_balancer::Strategy;

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Upstream backend definitions.
    pub backends: Vec<BackendConfig>,

    /// Request-time security thresholds.
    pub security: SecurityConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Scheduling, health checking and circuit breaking.
    pub load_balancing: LoadBalancingConfig,

    /// Listener and server timeouts.
    pub server: ServerConfig,

    /// Logging and metrics.
    pub monitoring: MonitoringConfig,

    /// Feature toggles.
    pub features: FeaturesConfig,
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend target: `http://host:port`, `host:port`, or `unix:///path/to.sock`.
    pub address: String,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Upstream call and health probe timeout.
    #[serde(default = "default_backend_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl BackendConfig {
    /// Backend with default weight and timeout.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            weight: default_weight(),
            timeout: default_backend_timeout(),
        }
    }
}

fn default_weight() -> u32 {
    1
}

pub(crate) fn default_backend_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Requests per window above which an IP is banned.
    pub ddos_threshold: usize,

    /// Window length above which a sub-second burst is rejected.
    pub dos_threshold: usize,

    /// How long a ban lasts.
    #[serde(with = "humantime_serde")]
    pub ban_duration: Duration,

    /// Sliding window length for the DDoS check.
    #[serde(with = "humantime_serde")]
    pub window_size: Duration,

    /// Maximum number of IPs tracked by the rate limiter.
    pub max_tracked_ips: usize,

    /// Secret mixed into JS challenge answers.
    pub js_challenge_secret: String,

    /// HMAC key for `X-HMAC-Signature`. Falls back to `js_challenge_secret`.
    pub hmac_secret: Option<String>,

    /// Maximum body size buffered for signature verification, in bytes.
    pub max_body_size: usize,

    pub geo_blocking: GeoBlockingConfig,

    pub user_agent_blocking: UserAgentBlockingConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ddos_threshold: 100,
            dos_threshold: 50,
            ban_duration: Duration::from_secs(300),
            window_size: Duration::from_secs(60),
            max_tracked_ips: 1000,
            js_challenge_secret: String::new(),
            hmac_secret: None,
            max_body_size: 2 * 1024 * 1024, // 2MB
            geo_blocking: GeoBlockingConfig::default(),
            user_agent_blocking: UserAgentBlockingConfig::default(),
        }
    }
}

/// Country-based blocking. The country code is read from a header set by
/// the perimeter in front of the balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeoBlockingConfig {
    pub enabled: bool,
    pub blocked_countries: Vec<String>,
    pub country_header: String,
}

impl Default for GeoBlockingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            blocked_countries: Vec::new(),
            country_header: "X-Country-Code".to_string(),
        }
    }
}

/// Substring-based User-Agent blocking.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UserAgentBlockingConfig {
    pub enabled: bool,
    pub blocked_patterns: Vec<String>,
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Accepted for compatibility; the cache is in-process only.
    pub redis_addr: String,

    /// Accepted for compatibility; cached responses always live five minutes.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Accepted for compatibility.
    pub max_size: String,

    /// Accepted for compatibility; see `features.compression`.
    pub enable_compression: bool,

    /// Largest declared response body that is buffered for caching.
    pub max_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_addr: String::new(),
            default_ttl: Duration::from_secs(300),
            max_size: "100MB".to_string(),
            enable_compression: false,
            max_entry_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Scheduling and failure-detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancingConfig {
    /// Initial scheduling strategy.
    pub strategy: Strategy,

    /// Period of the active health probe loop.
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,

    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::RoundRobin,
            health_check_interval: Duration::from_secs(10),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Per-backend circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time an open circuit waits before admitting a probe.
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port: ":8080", "8080" or a full "host:port".
    pub port: String,

    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Upper bound for handling one request end to end.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    pub enable_ssl: bool,
    pub cert_file: String,
    pub key_file: String,
}

impl ServerConfig {
    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        let port = self.port.trim();
        if let Some(rest) = port.strip_prefix(':') {
            format!("0.0.0.0:{}", rest)
        } else if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
            format!("0.0.0.0:{}", port)
        } else {
            port.to_string()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: ":8080".to_string(),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(120),
            enable_ssl: false,
            cert_file: String::new(),
            key_file: String::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Mount the tower-http trace layer.
    pub enable_tracing: bool,

    /// Install the Prometheus recorder and expose it.
    pub enable_metrics: bool,

    /// Path the Prometheus scrape output is served on.
    pub prometheus_endpoint: String,

    #[serde(with = "humantime_serde")]
    pub trace_retention: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Number of per-minute buckets kept by the metrics collector.
    pub metrics_retention_minutes: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_tracing: false,
            enable_metrics: false,
            prometheus_endpoint: "/metrics".to_string(),
            trace_retention: Duration::from_secs(3600),
            log_level: "info".to_string(),
            metrics_retention_minutes: 60,
        }
    }
}

/// Feature toggles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub websocket_support: bool,
    /// Gzip responses when the client accepts it.
    pub compression: bool,
    /// Log one line per proxied request.
    pub request_logging: bool,
    /// Mount the `/admin/*` routes.
    pub admin_api: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            websocket_support: false,
            compression: false,
            request_logging: false,
            admin_api: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_original_style_config() {
        let raw = r#"{
            "backends": [
                {"address": "http://localhost:9001", "weight": 5, "timeout": "2s"},
                {"address": "unix:///tmp/app.sock"}
            ],
            "security": {
                "ddos_threshold": 100,
                "dos_threshold": 20,
                "ban_duration": "10m",
                "window_size": "1s",
                "max_tracked_ips": 500,
                "js_challenge_secret": "s3cret",
                "geo_blocking": {"enabled": false, "blocked_countries": ["XX"]},
                "user_agent_blocking": {"enabled": true, "blocked_patterns": ["sqlmap"]}
            },
            "cache": {"redis_addr": "localhost:6379", "default_ttl": "1m", "max_size": "10MB", "enable_compression": true},
            "load_balancing": {
                "strategy": "weighted_round_robin",
                "health_check_interval": "5s",
                "circuit_breaker": {"failure_threshold": 3, "reset_timeout": "15s"}
            },
            "server": {"port": ":8080", "read_timeout": "5s", "write_timeout": "10s", "idle_timeout": "2m"},
            "monitoring": {"enable_tracing": true, "enable_metrics": false, "prometheus_endpoint": "/metrics", "trace_retention": "24h"},
            "features": {"websocket_support": false, "compression": false, "request_logging": true, "admin_api": true}
        }"#;

        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].weight, 5);
        assert_eq!(config.backends[0].timeout, Duration::from_secs(2));
        assert_eq!(config.backends[1].weight, 1);
        assert_eq!(config.backends[1].timeout, Duration::from_secs(10));
        assert_eq!(config.security.ban_duration, Duration::from_secs(600));
        assert_eq!(config.security.window_size, Duration::from_secs(1));
        assert_eq!(config.load_balancing.strategy, Strategy::WeightedRoundRobin);
        assert_eq!(config.load_balancing.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.load_balancing.circuit_breaker.reset_timeout, Duration::from_secs(15));
        assert_eq!(config.server.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.monitoring.trace_retention, Duration::from_secs(24 * 3600));
        assert!(config.features.request_logging);
        // Not present in the file, so defaults apply.
        assert_eq!(config.security.max_body_size, 2 * 1024 * 1024);
        assert_eq!(config.monitoring.metrics_retention_minutes, 60);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let raw = r#"{"load_balancing": {"strategy": "random"}}"#;
        assert!(serde_json::from_str::<Config>(raw).is_err());
    }

    #[test]
    fn bind_address_forms() {
        let mut server = ServerConfig::default();
        assert_eq!(server.bind_address(), "0.0.0.0:8080");

        server.port = "9000".into();
        assert_eq!(server.bind_address(), "0.0.0.0:9000");

        server.port = "127.0.0.1:7000".into();
        assert_eq!(server.bind_address(), "127.0.0.1:7000");
    }
}
