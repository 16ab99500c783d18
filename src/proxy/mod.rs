//! Upstream forwarding.
//!
//! # Data Flow
//! ```text
//! Selected backend + inbound request
//!     → forward.rs (rebuild request for the target, strip hop-by-hop headers)
//!     → backend client (TCP or unix socket) bounded by the backend timeout
//!     → record outcome on the backend (latency, circuit, liveness)
//!     → stream the upstream response back (body.rs, same deadline)
//! ```

pub mod body;
pub mod forward;

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tokio::time::Instant;

use crate::error::ProxyError;
use crate::load_balancer::Backend;

pub use body::{DeadlineBody, UpstreamDeadline};
pub use forward::{forward, strip_hop_by_hop};

/// Forward `request` to `backend` and record the outcome on it.
///
/// Transport failures and timeouts mark the backend dead and count against
/// its circuit, including a body that stalls past the deadline. A 5xx
/// response counts against the circuit only.
pub async fn proxy_to(backend: &Arc<Backend>, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
    backend.increment_requests();
    let started = Instant::now();

    match forward(backend, request).await {
        Ok(response) => {
            backend.update_response_time(started.elapsed());
            if response.status().is_server_error() {
                backend.record_failure();
            } else {
                backend.record_success();
            }
            Ok(response)
        }
        Err(e) => {
            backend.update_response_time(started.elapsed());
            let was_alive = backend.set_alive(false);
            backend.record_failure();
            if was_alive {
                tracing::warn!(backend = %backend.id(), error = %e, "Backend marked dead after upstream failure");
            }
            Err(e)
        }
    }
}
