//! Backend pool management.
//!
//! # Responsibilities
//! - Own the backend list and hand out stable ids
//! - Filter eligible backends and apply the active strategy
//! - Support runtime add/remove and strategy swaps from the admin API

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::{BackendConfig, CircuitBreakerConfig};
use crate::error::BackendError;
use crate::load_balancer::backend::{Backend, HttpClient, Target};
use crate::load_balancer::{LoadBalancer, Strategy};

/// The set of upstream backends plus the active scheduling strategy.
#[derive(Debug)]
pub struct BackendPool {
    backends: RwLock<Vec<Arc<Backend>>>,
    balancer: ArcSwap<Box<dyn LoadBalancer>>,
    next_id: AtomicU64,
    breaker: CircuitBreakerConfig,
    http: HttpClient,
}

impl BackendPool {
    /// Create a pool from configuration. Fails on the first unparsable target.
    pub fn new(
        configs: &[BackendConfig],
        breaker: &CircuitBreakerConfig,
        strategy: Strategy,
        http: HttpClient,
    ) -> Result<Self, BackendError> {
        let pool = Self {
            backends: RwLock::new(Vec::with_capacity(configs.len())),
            balancer: ArcSwap::from_pointee(strategy.balancer()),
            next_id: AtomicU64::new(0),
            breaker: breaker.clone(),
            http,
        };
        for config in configs {
            pool.add(&config.address, config.weight, config.timeout)?;
        }
        Ok(pool)
    }

    /// Select a backend with the active strategy.
    ///
    /// Returns `None` when no backend is both alive and admitted by its circuit.
    pub fn next_backend(&self) -> Option<Arc<Backend>> {
        let eligible: Vec<Arc<Backend>> = {
            let backends = self.backends.read().expect("backend list lock poisoned");
            backends.iter().filter(|b| b.is_eligible()).cloned().collect()
        };

        if eligible.is_empty() {
            tracing::debug!(backend_count = self.len(), "No eligible backends");
            return None;
        }

        self.balancer.load().next_server(&eligible)
    }

    /// Append a backend and return it.
    pub fn add(&self, address: &str, weight: u32, timeout: Duration) -> Result<Arc<Backend>, BackendError> {
        let target = Target::parse(address)?;
        let id = format!("backend-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let backend = Arc::new(Backend::new(id, target, weight, timeout, &self.breaker, &self.http));

        self.backends
            .write()
            .expect("backend list lock poisoned")
            .push(Arc::clone(&backend));

        tracing::info!(backend = %backend.id(), target = %backend.target(), weight, "Backend added");
        Ok(backend)
    }

    /// Remove a backend by id. Returns the removed backend if it existed.
    pub fn remove(&self, id: &str) -> Option<Arc<Backend>> {
        let mut backends = self.backends.write().expect("backend list lock poisoned");
        let index = backends.iter().position(|b| b.id() == id)?;
        let removed = backends.remove(index);
        tracing::info!(backend = %id, "Backend removed");
        Some(removed)
    }

    /// Snapshot of all backends (for health checking and stats).
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.backends.read().expect("backend list lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.backends.read().expect("backend list lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The active scheduling strategy.
    pub fn strategy(&self) -> Strategy {
        self.balancer.load().strategy()
    }

    /// Swap the active scheduling strategy.
    pub fn set_strategy(&self, strategy: Strategy) {
        self.balancer.store(Arc::new(strategy.balancer()));
        tracing::info!(strategy = %strategy, "Scheduling strategy changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::http_client;

    fn pool(addrs: &[&str], strategy: Strategy) -> BackendPool {
        let configs: Vec<BackendConfig> = addrs.iter().map(|a| BackendConfig::new(*a)).collect();
        BackendPool::new(&configs, &CircuitBreakerConfig::default(), strategy, http_client()).unwrap()
    }

    #[tokio::test]
    async fn ineligible_backends_are_never_selected() {
        let pool = pool(&["127.0.0.1:9001", "127.0.0.1:9002", "127.0.0.1:9003"], Strategy::RoundRobin);
        let backends = pool.all_backends();

        backends[0].set_alive(false);
        for _ in 0..5 {
            backends[1].record_failure();
        }

        for _ in 0..10 {
            assert_eq!(pool.next_backend().unwrap().id(), backends[2].id());
        }

        backends[2].set_alive(false);
        assert!(pool.next_backend().is_none());
    }

    #[tokio::test]
    async fn ids_are_unique_across_add_remove() {
        let pool = pool(&["127.0.0.1:9001", "127.0.0.1:9002"], Strategy::RoundRobin);
        assert_eq!(pool.len(), 2);

        let removed = pool.remove("backend-0").unwrap();
        assert_eq!(removed.id(), "backend-0");
        assert!(pool.remove("backend-0").is_none());

        let added = pool.add("127.0.0.1:9003", 2, Duration::from_secs(1)).unwrap();
        assert_eq!(added.id(), "backend-2");

        let ids: Vec<String> = pool.all_backends().iter().map(|b| b.id().to_string()).collect();
        assert_eq!(ids, ["backend-1", "backend-2"]);
    }

    #[tokio::test]
    async fn invalid_target_rejected() {
        let pool = pool(&[], Strategy::RoundRobin);
        assert!(pool.add("ftp://x", 1, Duration::from_secs(1)).is_err());
        assert!(pool.is_empty());
        assert!(pool.next_backend().is_none());
    }

    #[tokio::test]
    async fn strategy_swaps_at_runtime() {
        let pool = pool(&["127.0.0.1:9001", "127.0.0.1:9002"], Strategy::RoundRobin);
        assert_eq!(pool.strategy(), Strategy::RoundRobin);

        let backends = pool.all_backends();
        backends[0].update_response_time(Duration::from_millis(80));
        backends[1].update_response_time(Duration::from_millis(20));

        pool.set_strategy(Strategy::FastestFirst);
        assert_eq!(pool.strategy(), Strategy::FastestFirst);
        for _ in 0..3 {
            assert_eq!(pool.next_backend().unwrap().id(), "backend-1");
        }
    }
}
