//! Request inspection helpers.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Resolve the client IP behind proxies
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing and propagated upstream

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Makes a UUID v4 request ID for requests that do not carry one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Request ID of `request`, or `"unknown"`.
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Client IP: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// peer address, else `"unknown"`.
pub fn client_ip<B>(request: &Request<B>) -> String {
    let headers = request.headers();

    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn forwarded_for_wins() {
        let req = request(&[("x-forwarded-for", " 10.0.0.1 , 10.0.0.2"), ("x-real-ip", "10.0.0.9")]);
        assert_eq!(client_ip(&req), "10.0.0.1");
    }

    #[test]
    fn real_ip_then_peer_then_unknown() {
        assert_eq!(client_ip(&request(&[("x-real-ip", "10.0.0.9")])), "10.0.0.9");

        let mut req = request(&[]);
        assert_eq!(client_ip(&req), "unknown");

        req.extensions_mut()
            .insert(ConnectInfo("192.168.1.5:4242".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_ip(&req), "192.168.1.5");
    }

    #[test]
    fn generates_uuid_ids() {
        let req = request(&[]);
        let id = MakeRequestUuid.make_request_id(&req).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
        assert_eq!(request_id(&req), "unknown");
    }
}
