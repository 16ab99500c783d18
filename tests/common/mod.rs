//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

use edge_balancer::config::{BackendConfig, Config};
use edge_balancer::{HttpServer, LoadBalancerCore};

/// A request as seen by a mock backend.
#[derive(Debug, Clone, Default)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What a mock backend answers.
pub struct MockReply {
    pub status: u16,
    pub body: Vec<u8>,
    pub delay: Duration,
    /// Send only this many body bytes, then hold the connection open.
    pub stall_after: Option<usize>,
}

impl MockReply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
            stall_after: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Announce the full length but stop after `sent` body bytes.
    pub fn stalled_after(mut self, sent: usize) -> Self {
        self.stall_after = Some(sent);
        self
    }
}

type Handler = dyn Fn(&MockRequest) -> MockReply + Send + Sync;

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub address: String,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockBackend {
    /// Proxied calls, excluding `/health` probes.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<MockRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

/// Start a TCP mock backend on an ephemeral port.
pub async fn start_backend<F>(handler: F) -> MockBackend
where
    F: Fn(&MockRequest) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (backend, handler) = mock(format!("http://{}", addr), handler);

    let state = backend.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve(socket, Arc::clone(&handler), state.clone()));
        }
    });
    backend
}

/// Start a mock backend that always answers 200 with `body`.
pub async fn start_static_backend(body: &'static str) -> MockBackend {
    start_backend(move |_| MockReply::ok(body)).await
}

/// Start a mock backend on a unix socket at `path`.
#[cfg(unix)]
pub async fn start_unix_backend<F>(path: &std::path::Path, handler: F) -> MockBackend
where
    F: Fn(&MockRequest) -> MockReply + Send + Sync + 'static,
{
    let _ = std::fs::remove_file(path);
    let listener = tokio::net::UnixListener::bind(path).unwrap();
    let (backend, handler) = mock(format!("unix://{}", path.display()), handler);

    let state = backend.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve(socket, Arc::clone(&handler), state.clone()));
        }
    });
    backend
}

fn mock<F>(address: String, handler: F) -> (MockBackend, Arc<Handler>)
where
    F: Fn(&MockRequest) -> MockReply + Send + Sync + 'static,
{
    let backend = MockBackend {
        address,
        calls: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    (backend, Arc::new(handler))
}

/// An address nothing listens on.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn serve<S>(mut socket: S, handler: Arc<Handler>, state: MockBackend)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(request) = read_request(&mut socket).await else {
        return;
    };

    if request.path != "/health" {
        state.calls.fetch_add(1, Ordering::SeqCst);
        state.requests.lock().unwrap().push(request.clone());
    }

    let reply = handler(&request);
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason(reply.status),
        reply.body.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    if let Some(sent) = reply.stall_after {
        let _ = socket.write_all(&reply.body[..sent.min(reply.body.len())]).await;
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        return;
    }
    let _ = socket.write_all(&reply.body).await;
    let _ = socket.shutdown().await;
}

async fn read_request<S: AsyncRead + Unpin>(socket: &mut S) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(MockRequest {
        method,
        path,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Config pointing at the given backend addresses, with background-free defaults.
pub fn config_for(addresses: &[&str]) -> Config {
    let mut config = Config::default();
    config.backends = addresses.iter().map(|a| BackendConfig::new(*a)).collect();
    config
}

/// Build a core and its fully layered router.
pub fn app(config: Config) -> (Arc<LoadBalancerCore>, Router) {
    let core = Arc::new(LoadBalancerCore::new(config).unwrap());
    let router = HttpServer::new(Arc::clone(&core), None).router();
    (core, router)
}

/// Send one request through the router.
pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_from(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
