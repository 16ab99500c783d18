//! Client-facing error responses.
//!
//! Every early exit of the request pipeline is a [`Rejection`]; it knows its
//! status code, its plain-text body and whether it counts as an error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;

/// Why a request did not reach (or did not get an answer from) a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Banned,
    Filtered,
    RateLimited,
    InvalidSignature,
    PayloadTooLarge,
    NoBackend,
    BadGateway,
    GatewayTimeout,
}

impl Rejection {
    pub fn status(self) -> StatusCode {
        match self {
            Rejection::Banned | Rejection::Filtered => StatusCode::FORBIDDEN,
            Rejection::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Rejection::InvalidSignature => StatusCode::UNAUTHORIZED,
            Rejection::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::NoBackend => StatusCode::SERVICE_UNAVAILABLE,
            Rejection::BadGateway => StatusCode::BAD_GATEWAY,
            Rejection::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Rejection::Banned => "IP banned",
            Rejection::Filtered => "Forbidden",
            Rejection::RateLimited => "Rate limit exceeded",
            Rejection::InvalidSignature => "Invalid signature",
            Rejection::PayloadTooLarge => "Payload too large",
            Rejection::NoBackend => "Service Unavailable",
            Rejection::BadGateway => "Bad Gateway",
            Rejection::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// Metric label.
    pub fn reason(self) -> &'static str {
        match self {
            Rejection::Banned => "banned",
            Rejection::Filtered => "filtered",
            Rejection::RateLimited => "rate_limited",
            Rejection::InvalidSignature => "invalid_signature",
            Rejection::PayloadTooLarge => "payload_too_large",
            Rejection::NoBackend => "no_backend",
            Rejection::BadGateway => "bad_gateway",
            Rejection::GatewayTimeout => "gateway_timeout",
        }
    }
}

impl From<&ProxyError> for Rejection {
    fn from(err: &ProxyError) -> Self {
        if err.is_timeout() {
            Rejection::GatewayTimeout
        } else {
            Rejection::BadGateway
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}
