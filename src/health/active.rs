//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend liveness based on results

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use futures_util::future::join_all;
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::load_balancer::{Backend, BackendPool, Target};
use crate::observability::metrics;

/// Path probed on HTTP backends.
pub const HEALTH_PATH: &str = "/health";

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, interval: Duration) -> Self {
        Self { pool, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, path = HEALTH_PATH, "Health monitor starting");

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, concurrently.
    pub async fn check_all(&self) {
        let backends = self.pool.all_backends();
        join_all(backends.iter().map(|backend| async move {
            let healthy = probe(backend).await;
            let was_alive = backend.set_alive(healthy);
            if was_alive != healthy {
                if healthy {
                    tracing::info!(backend = %backend.id(), target = %backend.target(), "Backend is back up");
                } else {
                    tracing::warn!(backend = %backend.id(), target = %backend.target(), "Backend is down");
                }
            }
            metrics::record_backend_health(backend.id(), healthy);
        }))
        .await;
    }
}

/// One probe, bounded by the backend timeout.
///
/// HTTP backends are alive iff `GET /health` answers below 500; unix socket
/// backends are alive iff the socket accepts a connection.
pub async fn probe(backend: &Backend) -> bool {
    let timeout = backend.timeout();

    if let Target::Unix { path } = backend.target() {
        return match time::timeout(timeout, UnixStream::connect(path)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(backend = %backend.id(), error = %e, "Health check failed: dial error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %backend.id(), "Health check failed: timeout");
                false
            }
        };
    }

    let uri = match backend.target().health_uri(HEALTH_PATH) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(backend = %backend.id(), error = %e, "Failed to build health check uri");
            return false;
        }
    };
    let request = match Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::USER_AGENT, "edge-balancer-health-check")
        .body(Body::empty())
    {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(backend = %backend.id(), error = %e, "Failed to build health check request");
            return false;
        }
    };

    match time::timeout(timeout, backend.client().request(request)).await {
        Ok(Ok(response)) => {
            let up = response.status().as_u16() < 500;
            if !up {
                tracing::debug!(backend = %backend.id(), status = %response.status(), "Health check failed: server error");
            }
            up
        }
        Ok(Err(e)) => {
            tracing::debug!(backend = %backend.id(), error = %e, "Health check failed: connection error");
            false
        }
        Err(_) => {
            tracing::debug!(backend = %backend.id(), "Health check failed: timeout");
            false
        }
    }
}
