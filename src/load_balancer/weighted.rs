//! Smooth weighted round-robin strategy.
//!
//! Each round every candidate's accumulator grows by its weight, the largest
//! accumulator wins, and the winner pays back the round's total weight.
//! Over one full weight-sum cycle each backend is picked exactly `weight`
//! times, interleaved rather than in bursts.

use std::sync::{Arc, Mutex};

use crate::load_balancer::{backend::Backend, LoadBalancer, Strategy};

/// Run one smooth-WRR round over `backends` using `weight_of` as the weight.
///
/// Ties go to the earliest backend in the slice.
pub(crate) fn smooth_select<F>(backends: &[Arc<Backend>], weight_of: F) -> Option<Arc<Backend>>
where
    F: Fn(&Backend) -> i64,
{
    let mut total = 0i64;
    let mut best: Option<(&Arc<Backend>, i64)> = None;

    for backend in backends {
        let weight = weight_of(backend);
        total += weight;
        let current = backend.add_current_weight(weight);
        if best.map_or(true, |(_, top)| current > top) {
            best = Some((backend, current));
        }
    }

    let (chosen, _) = best?;
    chosen.add_current_weight(-total);
    Some(Arc::clone(chosen))
}

/// Weighted selector honouring each backend's configured weight.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    /// Serializes rounds so concurrent callers cannot interleave accumulators.
    round: Mutex<()>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let _round = self.round.lock().expect("wrr round mutex poisoned");
        smooth_select(backends, |b| i64::from(b.weight()))
    }

    fn strategy(&self) -> Strategy {
        Strategy::WeightedRoundRobin
    }
}
