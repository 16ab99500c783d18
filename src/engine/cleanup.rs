//! Periodic maintenance loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::engine::LoadBalancerCore;

/// How often the sweep runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Rate-limit entries idle longer than this are dropped.
pub const RATE_LIMIT_MAX_IDLE: Duration = Duration::from_secs(10 * 60);

/// Sweep every [`CLEANUP_INTERVAL`] until shutdown.
pub async fn run(core: Arc<LoadBalancerCore>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = time::interval_at(Instant::now() + CLEANUP_INTERVAL, CLEANUP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => core.sweep(),
            _ = shutdown.recv() => {
                tracing::info!("Cleanup loop received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
