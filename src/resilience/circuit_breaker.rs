//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, excluded from selection
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold (failures never decay while closed)
//! Open → Half-Open: reset_timeout elapsed, observed by can_accept_request()
//! Half-Open → Closed: a request succeeds (failure count reset)
//! Half-Open → Open: a request fails (reset timer restarts)
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global)
//! - State lives in an atomic so the hot path reads it without locking
//! - Every transition goes through `transition`, which holds the timestamp lock

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Circuit state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    /// Whether the state table allows moving from `self` to `to`.
    pub fn can_transition_to(self, to: CircuitState) -> bool {
        matches!(
            (self, to),
            (CircuitState::Closed, CircuitState::Open)
                | (CircuitState::Open, CircuitState::HalfOpen)
                | (CircuitState::HalfOpen, CircuitState::Closed)
                | (CircuitState::HalfOpen, CircuitState::Open)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Passive failure detector embedded in each backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u64,
    reset_timeout: Duration,
    state: AtomicU8,
    failures: AtomicU64,
    successes: AtomicU64,
    last_state_change: Mutex<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: u64::from(config.failure_threshold),
            reset_timeout: config.reset_timeout,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failures: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            last_state_change: Mutex::new(Instant::now()),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Whether a request may be routed here.
    ///
    /// An open circuit whose reset timeout has elapsed moves to half-open
    /// and admits the request.
    pub fn can_accept_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = {
                    let changed_at = self
                        .last_state_change
                        .lock()
                        .expect("circuit breaker mutex poisoned");
                    changed_at.elapsed() >= self.reset_timeout
                };
                if !cooled_down {
                    return false;
                }
                // A concurrent caller may have won the race; half-open admits both.
                self.transition(CircuitState::Open, CircuitState::HalfOpen);
                self.state() != CircuitState::Open
            }
        }
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        if self.state() == CircuitState::HalfOpen
            && self.transition(CircuitState::HalfOpen, CircuitState::Closed)
        {
            self.failures.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        match self.state() {
            CircuitState::Closed if failures >= self.failure_threshold => {
                self.transition(CircuitState::Closed, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                self.transition(CircuitState::HalfOpen, CircuitState::Open);
            }
            _ => {}
        }
    }

    /// Move from `from` to `to` if the circuit is still in `from`.
    fn transition(&self, from: CircuitState, to: CircuitState) -> bool {
        debug_assert!(from.can_transition_to(to));
        let mut changed_at = self
            .last_state_change
            .lock()
            .expect("circuit breaker mutex poisoned");
        if self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *changed_at = Instant::now();
        tracing::debug!(from = %from, to = %to, "Circuit state changed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(&CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
        })
    }

    #[test]
    fn transition_table() {
        use CircuitState::*;
        assert!(Closed.can_transition_to(Open));
        assert!(Open.can_transition_to(HalfOpen));
        assert!(HalfOpen.can_transition_to(Closed));
        assert!(HalfOpen.can_transition_to(Open));
        assert!(!Closed.can_transition_to(HalfOpen));
        assert!(!Open.can_transition_to(Closed));
    }

    #[test]
    fn opens_after_exact_threshold() {
        let cb = breaker(5, Duration::from_secs(30));
        for _ in 0..4 {
            cb.record_failure();
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.state().as_str(), "open");
        assert!(!cb.can_accept_request());
    }

    #[test]
    fn closed_successes_do_not_decay_failures() {
        let cb = breaker(3, Duration::from_secs(30));
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 2);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_opens_exactly_at_reset_timeout() {
        let cb = breaker(1, Duration::from_secs(30));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!cb.can_accept_request());
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.can_accept_request());
        assert_eq!(cb.state().as_str(), "half-open");
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_success_closes_and_resets() {
        let cb = breaker(2, Duration::from_secs(5));
        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.can_accept_request());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let cb = breaker(2, Duration::from_secs(5));
        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.can_accept_request());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        // Reset timer restarted with the reopen.
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!cb.can_accept_request());
    }
}
