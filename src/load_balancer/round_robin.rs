//! Round-robin load balancing strategy.

use std::sync::{Arc, Mutex};

use crate::load_balancer::{backend::Backend, weighted::smooth_select, LoadBalancer, Strategy};

/// Round-robin selector.
/// Runs the smooth weighted algorithm with every backend counting as weight 1.
#[derive(Debug, Default)]
pub struct RoundRobin {
    round: Mutex<()>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let _round = self.round.lock().expect("round robin mutex poisoned");
        smooth_select(backends, |_| 1)
    }

    fn strategy(&self) -> Strategy {
        Strategy::RoundRobin
    }
}
