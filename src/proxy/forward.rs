//! Outbound request construction.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, Version};
use axum::response::Response;
use tokio::time::Instant;

use crate::error::ProxyError;
use crate::load_balancer::Backend;
use crate::proxy::body::{DeadlineBody, UpstreamDeadline};

/// Connection-scoped headers that must not cross the proxy.
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(listed.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Send `request` to `backend`, bounded by the backend timeout.
///
/// One deadline covers the whole exchange: the response head must arrive
/// before it, and the streamed response body fails once it passes.
/// Method, path, query and end-to-end headers are kept; `Host` is left to the
/// client so it matches the target.
pub async fn forward(backend: &Arc<Backend>, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
    let timeout = backend.timeout();
    let deadline = Instant::now() + timeout;
    let (parts, body) = request.into_parts();

    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let uri = backend.target().upstream_uri(path_and_query)?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    let mut outbound = Request::builder()
        .method(parts.method)
        .uri(uri)
        .version(Version::HTTP_11)
        .body(body)?;
    *outbound.headers_mut() = headers;

    let response = tokio::time::timeout_at(deadline, backend.client().request(outbound))
        .await
        .map_err(|_| ProxyError::Timeout(timeout))??;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    parts.extensions.insert(UpstreamDeadline(deadline));
    let body = DeadlineBody::new(body, deadline, timeout, Arc::clone(backend));
    Ok(Response::from_parts(parts, Body::new(body)))
}
