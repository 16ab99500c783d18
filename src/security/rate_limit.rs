//! Per-IP request history for the sliding-window rate limiter.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Request history of one client IP.
#[derive(Debug, Default, Clone)]
pub struct RateLimitEntry {
    /// Request timestamps inside the window, oldest first.
    requests: VecDeque<Instant>,
    /// Set by the DoS gate only; `None` until the first DoS check.
    last_request: Option<Instant>,
}

impl RateLimitEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop timestamps that are `window` or more in the past.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Append a request timestamp and return the new count.
    pub fn record(&mut self, now: Instant) -> usize {
        self.requests.push_back(now);
        self.requests.len()
    }

    /// Number of requests currently in the window.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_request = Some(now);
    }

    /// Idle means no DoS check in the last `max_idle`, or never.
    pub fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        match self.last_request {
            Some(at) => now.saturating_duration_since(at) > max_idle,
            None => true,
        }
    }
}
