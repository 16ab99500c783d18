use std::collections::HashMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::schema::default_backend_timeout;
use crate::http::server::AppState;
use crate::load_balancer::{Backend, Strategy};
use crate::observability::MetricsSnapshot;

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendStats {
    pub id: String,
    pub target: String,
    pub weight: u32,
    pub alive: bool,
    pub circuit_state: String,
    pub failure_count: u64,
    pub success_count: u64,
    pub total_requests: u64,
    pub response_time_ms: f64,
    pub avg_latency_ms: f64,
}

impl From<&Backend> for BackendStats {
    fn from(b: &Backend) -> Self {
        Self {
            id: b.id().to_string(),
            target: b.target().to_string(),
            weight: b.weight(),
            alive: b.is_alive(),
            circuit_state: b.circuit_state().to_string(),
            failure_count: b.failure_count(),
            success_count: b.success_count(),
            total_requests: b.total_requests(),
            response_time_ms: b.response_time().as_secs_f64() * 1000.0,
            avg_latency_ms: b.avg_latency().as_secs_f64() * 1000.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub strategy: Strategy,
    pub uptime_seconds: u64,
    pub backends: Vec<BackendStats>,
    pub metrics: MetricsSnapshot,
    pub cache_entries: usize,
    pub tracked_ips: usize,
    pub banned_ips: usize,
}

/// Body of `POST /admin/backend`. `url` and `address` are synonyms.
#[derive(Debug, Deserialize)]
pub struct AddBackendRequest {
    pub url: Option<String>,
    pub address: Option<String>,
    pub weight: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

fn bad_request(message: impl Into<String>) -> Response {
    let message = message.into();
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": message }))).into_response()
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let core = &state.core;
    let backends = core
        .pool()
        .all_backends()
        .iter()
        .map(|b| BackendStats::from(b.as_ref()))
        .collect();

    Json(StatsResponse {
        strategy: core.pool().strategy(),
        uptime_seconds: core.uptime().as_secs(),
        backends,
        metrics: core.metrics().snapshot(),
        cache_entries: core.cache().len(),
        tracked_ips: core.security().tracked_ips(),
        banned_ips: core.security().banned_ips(),
    })
}

pub async fn add_backend(State(state): State<AppState>, body: Bytes) -> Response {
    let request: AddBackendRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return bad_request(format!("invalid JSON body: {}", e)),
    };

    let Some(address) = request.url.or(request.address).filter(|a| !a.trim().is_empty()) else {
        return bad_request("missing backend url");
    };
    let weight = request.weight.unwrap_or(1);
    if weight == 0 {
        return bad_request("weight must be greater than 0");
    }
    let timeout = request.timeout.unwrap_or_else(default_backend_timeout);

    match state.core.pool().add(&address, weight, timeout) {
        Ok(backend) => (StatusCode::CREATED, Json(BackendStats::from(backend.as_ref()))).into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}

pub async fn remove_backend(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(id) = params.get("id").filter(|id| !id.is_empty()) else {
        return bad_request("missing id");
    };

    match state.core.pool().remove(id) {
        Some(_) => Json(serde_json::json!({ "removed": id })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown backend {}", id) })),
        )
            .into_response(),
    }
}

/// Strategy name from `?strategy=` or a form-encoded body.
pub async fn set_strategy(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let name = params.get("strategy").cloned().or_else(|| {
        url::form_urlencoded::parse(&body)
            .find(|(k, _)| k == "strategy")
            .map(|(_, v)| v.into_owned())
    });

    let Some(name) = name else {
        return bad_request("missing strategy");
    };

    match name.parse::<Strategy>() {
        Ok(strategy) => {
            state.core.pool().set_strategy(strategy);
            Json(serde_json::json!({ "strategy": strategy })).into_response()
        }
        Err(e) => bad_request(e.to_string()),
    }
}
