//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, compression)
//! - Bind server to listener and drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::engine::LoadBalancerCore;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<LoadBalancerCore>,
    pub prometheus: Option<PrometheusHandle>,
}

/// HTTP front end of the balancer.
pub struct HttpServer {
    router: Router,
    core: Arc<LoadBalancerCore>,
}

impl HttpServer {
    pub fn new(core: Arc<LoadBalancerCore>, prometheus: Option<PrometheusHandle>) -> Self {
        let state = AppState {
            core: Arc::clone(&core),
            prometheus,
        };
        let router = Self::build_router(state);
        Self { router, core }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.core.config().clone();

        let mut router = Router::new().route("/health", get(health_handler));

        if config.features.admin_api {
            router = router.merge(admin::router());
        }
        if state.prometheus.is_some() {
            router = router.route(&config.monitoring.prometheus_endpoint, get(metrics_handler));
        }

        let mut router = router
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(config.server.write_timeout));

        if config.features.compression {
            router = router.layer(CompressionLayer::new());
        }
        router = router.layer(PropagateRequestIdLayer::new(X_REQUEST_ID));
        if config.monitoring.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }
        router.layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn core(&self) -> &Arc<LoadBalancerCore> {
        &self.core
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => axum::http::StatusCode::NOT_FOUND.into_response(),
    }
}

/// Everything that is not a local route goes through the pipeline.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.core.handle(request).await
}
