//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (health checks, cleanup)
//! - Bind the listener and serve until shutdown

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{Config, ServerConfig};
use crate::engine::LoadBalancerCore;
use crate::error::BackendError;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("backend setup failed: {0}")]
    Backend(#[from] BackendError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Settings the core accepts but does not act on, as `(key, reason)`.
///
/// Server timeouts count only when changed from their defaults;
/// `server.write_timeout` is the one bound applied to each request.
pub fn unsupported_settings(config: &Config) -> Vec<(&'static str, &'static str)> {
    let defaults = ServerConfig::default();
    let mut ignored = Vec::new();

    if config.server.enable_ssl {
        ignored.push(("server.enable_ssl", "TLS is terminated in front of the balancer; serving plain HTTP"));
    }
    if config.server.read_timeout != defaults.read_timeout {
        ignored.push(("server.read_timeout", "not applied; server.write_timeout bounds each request"));
    }
    if config.server.idle_timeout != defaults.idle_timeout {
        ignored.push(("server.idle_timeout", "not applied; keep-alive connections stay open until the client closes them"));
    }
    if config.features.websocket_support {
        ignored.push(("features.websocket_support", "upgrades are not proxied"));
    }
    if !config.cache.redis_addr.is_empty() {
        ignored.push(("cache.redis_addr", "the cache is in-process"));
    }
    ignored
}

/// Log configuration the core accepts but does not act on.
pub fn warn_unsupported(config: &Config) {
    for (setting, reason) in unsupported_settings(config) {
        tracing::warn!(setting, reason, "Setting is accepted but ignored");
    }
}

/// Build everything from `config` and serve until `shutdown` fires.
pub async fn run(config: Config, shutdown: Shutdown) -> Result<(), StartupError> {
    warn_unsupported(&config);

    let prometheus = if config.monitoring.enable_metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let address = config.server.bind_address();
    let core = Arc::new(LoadBalancerCore::new(config)?);

    for backend in core.pool().all_backends() {
        tracing::info!(
            backend = %backend.id(),
            target = %backend.target(),
            weight = backend.weight(),
            "Backend registered"
        );
    }

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(
        address = %listener.local_addr()?,
        strategy = %core.pool().strategy(),
        backends = core.pool().len(),
        "Listening for connections"
    );

    let background = core.spawn_background(&shutdown);
    let server = HttpServer::new(Arc::clone(&core), prometheus);
    let result = server.run(listener, shutdown.subscribe()).await;

    // The server can also stop on its own (listener error); make sure the loops follow.
    shutdown.trigger();
    for handle in background {
        let _ = handle.await;
    }

    result.map_err(StartupError::from)
}
