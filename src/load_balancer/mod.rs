//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request reaches the selection stage
//!     → pool.rs (eligibility filter under the list read lock)
//!     → Apply the active strategy:
//!         - round_robin.rs (smooth rotation, every backend counts once)
//!         - weighted.rs (smooth weighted round robin)
//!         - fastest.rs (lowest last response time)
//!     → Return the chosen backend or None (caller answers 503)
//! ```
//!
//! # Design Decisions
//! - Strategies only ever see eligible backends
//! - One strategy is active globally and can be swapped at runtime
//! - Per-backend accumulators are mutated under the backend's own lock

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod fastest;
pub mod pool;
pub mod round_robin;
pub mod weighted;

pub use backend::{Backend, Target};
pub use pool::BackendPool;

/// A backend selection algorithm.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Pick one backend out of the already-eligible set.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;

    /// Which strategy this instance implements.
    fn strategy(&self) -> Strategy;
}

/// Scheduling strategy names as they appear in config and the admin API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    FastestFirst,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::RoundRobin => "round_robin",
            Strategy::WeightedRoundRobin => "weighted_round_robin",
            Strategy::FastestFirst => "fastest_first",
        }
    }

    /// Instantiate the algorithm for this strategy.
    pub fn balancer(self) -> Box<dyn LoadBalancer> {
        match self {
            Strategy::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            Strategy::WeightedRoundRobin => Box::new(weighted::WeightedRoundRobin::new()),
            Strategy::FastestFirst => Box::new(fastest::FastestFirst::new()),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised strategy name.
#[derive(Debug, thiserror::Error)]
#[error("unknown strategy {0:?}")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "round_robin" => Ok(Strategy::RoundRobin),
            "weighted_round_robin" => Ok(Strategy::WeightedRoundRobin),
            "fastest_first" => Ok(Strategy::FastestFirst),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for s in [Strategy::RoundRobin, Strategy::WeightedRoundRobin, Strategy::FastestFirst] {
            assert_eq!(s.as_str().parse::<Strategy>().unwrap(), s);
            assert_eq!(s.balancer().strategy(), s);
        }
        assert!("least_conn".parse::<Strategy>().is_err());
    }
}
