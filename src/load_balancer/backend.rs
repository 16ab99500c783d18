//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream target (HTTP authority or unix socket)
//! - Track liveness as reported by the active health loop
//! - Embed the passive circuit breaker
//! - Track latency (last sample + EMA) and the smooth-WRR accumulator

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client, ResponseFuture};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::CircuitBreakerConfig;
use crate::error::BackendError;
use crate::net::UnixConnector;
use crate::resilience::{CircuitBreaker, CircuitState};

/// Shared client type for TCP backends.
pub type HttpClient = Client<HttpConnector, Body>;

/// Build the pooled client shared by every HTTP backend.
pub fn http_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Where a backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Plain HTTP upstream; `authority` is `host[:port]`.
    Http { base: Url, authority: String },
    /// HTTP over a unix domain socket.
    Unix { path: PathBuf },
}

impl Target {
    /// Parse `http://host:port`, bare `host:port`, or `unix:///path`.
    pub fn parse(address: &str) -> Result<Self, BackendError> {
        let address = address.trim();
        if let Some(path) = address.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(BackendError::invalid(address, "empty socket path"));
            }
            return Ok(Target::Unix {
                path: PathBuf::from(path),
            });
        }

        let candidate = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        let base = Url::parse(&candidate).map_err(|e| BackendError::invalid(address, e.to_string()))?;
        if base.scheme() != "http" {
            return Err(BackendError::invalid(
                address,
                format!("unsupported scheme {:?}", base.scheme()),
            ));
        }
        let host = base
            .host_str()
            .ok_or_else(|| BackendError::invalid(address, "missing host"))?;
        let authority = match base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Ok(Target::Http { base, authority })
    }

    /// Absolute URI for forwarding a request with the given path and query.
    pub fn upstream_uri(&self, path_and_query: &str) -> Result<Uri, axum::http::uri::InvalidUri> {
        match self {
            Target::Http { authority, .. } => format!("http://{}{}", authority, path_and_query).parse(),
            Target::Unix { .. } => format!("http://localhost{}", path_and_query).parse(),
        }
    }

    /// Absolute URI of a health endpoint, kept under any base path the
    /// configured address carries (`http://h/app` probes `/app/health`).
    pub fn health_uri(&self, health_path: &str) -> Result<Uri, axum::http::uri::InvalidUri> {
        match self {
            Target::Http { base, authority } => format!(
                "http://{}{}{}",
                authority,
                base.path().trim_end_matches('/'),
                health_path
            )
            .parse(),
            Target::Unix { .. } => self.upstream_uri(health_path),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Http { base, .. } => write!(f, "{}", base),
            Target::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Transport used to reach a backend.
#[derive(Clone)]
pub enum UpstreamClient {
    Http(HttpClient),
    Unix(Client<UnixConnector, Body>),
}

impl UpstreamClient {
    fn for_target(target: &Target, http: &HttpClient) -> Self {
        match target {
            Target::Http { .. } => UpstreamClient::Http(http.clone()),
            Target::Unix { path } => UpstreamClient::Unix(
                Client::builder(TokioExecutor::new()).build(UnixConnector::new(path.clone())),
            ),
        }
    }

    pub fn request(&self, request: Request<Body>) -> ResponseFuture {
        match self {
            UpstreamClient::Http(client) => client.request(request),
            UpstreamClient::Unix(client) => client.request(request),
        }
    }
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamClient::Http(_) => f.write_str("UpstreamClient::Http"),
            UpstreamClient::Unix(_) => f.write_str("UpstreamClient::Unix"),
        }
    }
}

/// Mutable per-backend fields guarded by the backend's own lock.
#[derive(Debug, Default)]
struct Timing {
    current_weight: i64,
    response_time: Duration,
    avg_latency: Option<Duration>,
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    id: String,
    target: Target,
    weight: u32,
    timeout: Duration,
    client: UpstreamClient,
    alive: AtomicBool,
    total_requests: AtomicU64,
    circuit: CircuitBreaker,
    timing: Mutex<Timing>,
}

impl Backend {
    /// Create a new backend. Backends start alive with a closed circuit.
    pub fn new(
        id: impl Into<String>,
        target: Target,
        weight: u32,
        timeout: Duration,
        breaker: &CircuitBreakerConfig,
        http: &HttpClient,
    ) -> Self {
        let client = UpstreamClient::for_target(&target, http);
        Self {
            id: id.into(),
            target,
            weight,
            timeout,
            client,
            alive: AtomicBool::new(true),
            total_requests: AtomicU64::new(0),
            circuit: CircuitBreaker::new(breaker),
            timing: Mutex::new(Timing {
                current_weight: i64::from(weight),
                ..Timing::default()
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    // --- Health Logic ---

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Record the liveness signal. Returns the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::Relaxed)
    }

    /// Eligibility filter: alive and admitted by the circuit breaker.
    pub fn is_eligible(&self) -> bool {
        self.is_alive() && self.can_accept_request()
    }

    // --- Circuit Breaker ---

    pub fn can_accept_request(&self) -> bool {
        self.circuit.can_accept_request()
    }

    pub fn record_success(&self) {
        self.circuit.record_success();
    }

    pub fn record_failure(&self) {
        self.circuit.record_failure();
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    pub fn failure_count(&self) -> u64 {
        self.circuit.failure_count()
    }

    pub fn success_count(&self) -> u64 {
        self.circuit.success_count()
    }

    // --- Counters & Latency ---

    pub fn increment_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Record a latency sample and fold it into the EMA.
    pub fn update_response_time(&self, sample: Duration) {
        let mut timing = self.timing.lock().expect("backend timing mutex poisoned");
        timing.response_time = sample;
        timing.avg_latency = Some(match timing.avg_latency {
            None => sample,
            Some(avg) => {
                let nanos = avg.as_nanos() as f64 * 0.9 + sample.as_nanos() as f64 * 0.1;
                Duration::from_nanos(nanos.round() as u64)
            }
        });
    }

    /// Last observed response time (zero before the first sample).
    pub fn response_time(&self) -> Duration {
        self.timing.lock().expect("backend timing mutex poisoned").response_time
    }

    /// Exponential moving average latency (zero before the first sample).
    pub fn avg_latency(&self) -> Duration {
        self.timing
            .lock()
            .expect("backend timing mutex poisoned")
            .avg_latency
            .unwrap_or_default()
    }

    /// Add `delta` to the smooth-WRR accumulator, returning the new value.
    pub(crate) fn add_current_weight(&self, delta: i64) -> i64 {
        let mut timing = self.timing.lock().expect("backend timing mutex poisoned");
        timing.current_weight += delta;
        timing.current_weight
    }
}
