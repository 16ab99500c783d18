//! Error types for backend construction and upstream forwarding.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while turning a configured address into a backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The address could not be parsed as a supported target.
    #[error("invalid backend target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl BackendError {
    pub(crate) fn invalid(target: &str, reason: impl Into<String>) -> Self {
        BackendError::InvalidTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while forwarding a request to a backend.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Connecting to or talking with the upstream failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The upstream did not answer within the backend timeout.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// The outbound request could not be assembled.
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    /// The upstream URI could not be assembled.
    #[error("invalid upstream uri: {0}")]
    Uri(#[from] axum::http::uri::InvalidUri),
}

impl ProxyError {
    /// Whether this error came from the backend timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProxyError::Timeout(_))
    }
}
