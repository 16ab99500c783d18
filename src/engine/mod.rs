//! Request pipeline and background maintenance.
//!
//! # Data Flow
//! ```text
//! Request
//!     → client IP resolution
//!     → ban check → UA/geo filters → DDoS window → DoS burst gate
//!     → HMAC verification (body buffered and replayed)
//!     → JS challenge (answered here)
//!     → cache lookup
//!     → backend selection → forward → record outcome → maybe cache
//! ```
//!
//! The first failing stage short-circuits with a [`Rejection`]. Every
//! request, rejected or not, lands in the metrics collector.

pub mod cleanup;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cache::{cache_key, is_cacheable, CacheManager, CachedResponse, RESPONSE_CACHE_TTL};
use crate::config::Config;
use crate::error::BackendError;
use crate::health::HealthMonitor;
use crate::http::request::{client_ip, request_id};
use crate::http::response::Rejection;
use crate::lifecycle::Shutdown;
use crate::load_balancer::backend::{http_client, Backend};
use crate::load_balancer::BackendPool;
use crate::observability::{metrics, MetricsCollector};
use crate::proxy::{proxy_to, UpstreamDeadline};
use crate::security::SecurityManager;

/// Header carrying a hex HMAC-SHA256 of the request body.
pub const HMAC_SIGNATURE_HEADER: &str = "x-hmac-signature";

/// Header asking for a JS challenge (value `request`).
pub const JS_CHALLENGE_HEADER: &str = "x-js-challenge";

/// Everything the request path and admin API share.
#[derive(Debug)]
pub struct LoadBalancerCore {
    config: Config,
    pool: Arc<BackendPool>,
    security: SecurityManager,
    cache: CacheManager,
    metrics: MetricsCollector,
    started: Instant,
}

impl LoadBalancerCore {
    /// Build the core from a validated configuration.
    pub fn new(config: Config) -> Result<Self, BackendError> {
        let lb = &config.load_balancing;
        let pool = BackendPool::new(&config.backends, &lb.circuit_breaker, lb.strategy, http_client())?;

        Ok(Self {
            pool: Arc::new(pool),
            security: SecurityManager::new(&config.security),
            cache: CacheManager::new(),
            metrics: MetricsCollector::new(config.monitoring.metrics_retention_minutes),
            started: Instant::now(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn security(&self) -> &SecurityManager {
        &self.security
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Run one request through the pipeline.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let request_id = request_id(&request);
        let client_ip = client_ip(&request);
        let mut backend_label = String::from("none");

        let (response, is_error) = match self.pipeline(request, &client_ip, &mut backend_label).await {
            Ok(response) => {
                let is_error = response.status().is_server_error();
                (response, is_error)
            }
            Err(rejection) => {
                metrics::record_rejection(rejection.reason());
                tracing::debug!(
                    request_id = %request_id,
                    client_ip = %client_ip,
                    reason = rejection.reason(),
                    "Request rejected"
                );
                (rejection.into_response(), true)
            }
        };

        let elapsed = started.elapsed();
        let status = response.status();
        self.metrics.record_request(elapsed, is_error);
        metrics::record_request(method.as_str(), status.as_u16(), &backend_label, elapsed);

        if self.config.features.request_logging {
            tracing::info!(
                request_id = %request_id,
                client_ip = %client_ip,
                method = %method,
                path = %path,
                status = status.as_u16(),
                backend = %backend_label,
                latency_ms = elapsed.as_millis() as u64,
                "Request handled"
            );
        }

        response
    }

    async fn pipeline(
        &self,
        request: Request<Body>,
        client_ip: &str,
        backend_label: &mut String,
    ) -> Result<Response, Rejection> {
        if self.security.is_blocked(client_ip) {
            return Err(Rejection::Banned);
        }

        if let Some(reason) = self.security.filter(request.headers()) {
            tracing::info!(client_ip = %client_ip, reason = ?reason, "Request filtered");
            return Err(Rejection::Filtered);
        }

        if self.security.check_ddos(client_ip) || self.security.check_dos(client_ip) {
            return Err(Rejection::RateLimited);
        }

        let request = self.verify_signature(request).await?;

        if is_js_challenge(&request) {
            let challenge = self.security.generate_js_challenge();
            return Ok((
                [(header::CONTENT_TYPE, "application/javascript")],
                challenge.script,
            )
                .into_response());
        }

        let cacheable = is_cacheable(request.method(), request.uri());
        let key = cacheable.then(|| cache_key(request.method(), request.uri()));

        if let Some(key) = &key {
            let hit = self.cache.get(key);
            metrics::record_cache_lookup(hit.is_some());
            if let Some(cached) = hit {
                *backend_label = "cache".to_string();
                let mut response = Response::new(Body::from(cached.body.clone()));
                *response.headers_mut() = cached.header_map();
                return Ok(response);
            }
        }

        let backend = self.pool.next_backend().ok_or(Rejection::NoBackend)?;
        *backend_label = backend.id().to_string();

        let response = match proxy_to(&backend, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(backend = %backend.id(), error = %e, "Upstream error");
                return Err(Rejection::from(&e));
            }
        };

        match key {
            Some(key) if response.status() == StatusCode::OK => self.store(key, response, &backend).await,
            _ => Ok(response),
        }
    }

    /// Buffer and verify a signed body, then hand back an equivalent request.
    async fn verify_signature(&self, request: Request<Body>) -> Result<Request<Body>, Rejection> {
        // Undecodable bytes survive as replacement characters and fail verification.
        let Some(signature) = request
            .headers()
            .get(HMAC_SIGNATURE_HEADER)
            .filter(|v| !v.is_empty())
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        else {
            return Ok(request);
        };

        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, self.config.security.max_body_size)
            .await
            .map_err(|_| Rejection::PayloadTooLarge)?;

        if !self.security.verify_hmac(&bytes, &signature) {
            return Err(Rejection::InvalidSignature);
        }
        Ok(Request::from_parts(parts, Body::from(bytes)))
    }

    /// Buffer a cacheable response if it declares a small enough length.
    async fn store(&self, key: String, response: Response, backend: &Backend) -> Result<Response, Rejection> {
        let limit = self.config.cache.max_entry_bytes;
        let declared = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());

        match declared {
            Some(len) if len <= limit => {}
            _ => return Ok(response),
        }

        let (parts, body) = response.into_parts();
        let bytes = match to_bytes(body, limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(backend = %backend.id(), error = %e, "Failed to read upstream body");
                // The body itself records a deadline expiry on the backend.
                let timed_out = parts
                    .extensions
                    .get::<UpstreamDeadline>()
                    .is_some_and(UpstreamDeadline::has_passed);
                return Err(if timed_out {
                    Rejection::GatewayTimeout
                } else {
                    Rejection::BadGateway
                });
            }
        };

        self.cache
            .set(key, CachedResponse::new(bytes.clone(), &parts.headers), RESPONSE_CACHE_TTL);
        Ok(Response::from_parts(parts, Body::from(bytes)))
    }

    /// One maintenance pass: idle rate-limit entries, expired bans and
    /// expired cache entries.
    pub fn sweep(&self) {
        let idle = self.security.cleanup_idle(cleanup::RATE_LIMIT_MAX_IDLE);
        let bans = self.security.purge_expired_bans();
        let expired = self.cache.purge_expired();
        metrics::record_cache_size(self.cache.len());
        if idle > 0 || bans > 0 || expired > 0 {
            tracing::debug!(idle_ips = idle, expired_bans = bans, expired_entries = expired, "Cleanup sweep");
        }
    }

    /// Start the health and cleanup loops. Both stop when `shutdown` fires.
    pub fn spawn_background(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let monitor = HealthMonitor::new(
            Arc::clone(&self.pool),
            self.config.load_balancing.health_check_interval,
        );
        vec![
            tokio::spawn(monitor.run(shutdown.subscribe())),
            tokio::spawn(cleanup::run(Arc::clone(self), shutdown.subscribe())),
        ]
    }
}

fn is_js_challenge<B>(request: &Request<B>) -> bool {
    request.headers().get(JS_CHALLENGE_HEADER) == Some(&HeaderValue::from_static("request"))
}
