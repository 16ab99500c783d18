//! Fastest-first load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer, Strategy};

/// Selects the backend with the lowest last observed response time.
/// Backends without a sample yet count as zero, so they get probed first.
#[derive(Debug, Default)]
pub struct FastestFirst;

impl FastestFirst {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for FastestFirst {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        // In case of tie, the first one is selected (stability)
        backends.iter().min_by_key(|b| b.response_time()).cloned()
    }

    fn strategy(&self) -> Strategy {
        Strategy::FastestFirst
    }
}
