//! Admin API: runtime inspection and backend/strategy management.
//!
//! No authentication; the perimeter in front of the balancer restricts access.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(get_stats))
        .route("/admin/backend", post(add_backend).delete(remove_backend))
        .route("/admin/strategy", post(set_strategy))
}
