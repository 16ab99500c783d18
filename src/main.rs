//! edge-balancer
//!
//! An HTTP load balancer built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────────┐
//!                              │                     EDGE BALANCER                         │
//!                              │                                                           │
//!     Client Request           │  ┌─────────┐    ┌──────────┐    ┌──────────────┐          │
//!     ─────────────────────────┼─▶│  http   │───▶│ security │───▶│    cache     │          │
//!                              │  │ server  │    │ bans/rate│    │   lookup     │          │
//!                              │  └─────────┘    └──────────┘    └──────┬───────┘          │
//!                              │                                        │ miss             │
//!                              │                                        ▼                  │
//!                              │                                ┌──────────────┐           │
//!                              │                                │load_balancer │           │
//!                              │                                │ pool+strategy│           │
//!                              │                                └──────┬───────┘           │
//!                              │                                       │                   │
//!                              │                                       ▼                   │
//!     Client Response          │  ┌─────────┐                   ┌──────────────┐           │
//!     ◀────────────────────────┼──│  http   │◀──────────────────│    proxy     │◀──────────┼──── Backend
//!                              │  │ server  │                   │   forward    │           │     (TCP or
//!                              │  └─────────┘                   └──────────────┘           │      unix)
//!                              │                                                           │
//!                              │  ┌─────────────────────────────────────────────────────┐  │
//!                              │  │               Cross-Cutting Concerns                 │  │
//!                              │  │  ┌────────┐ ┌────────┐ ┌───────────┐ ┌───────────┐  │  │
//!                              │  │  │ config │ │ health │ │ observa-  │ │ admin api │  │  │
//!                              │  │  │        │ │ checks │ │ bility    │ │           │  │  │
//!                              │  │  └────────┘ └────────┘ └───────────┘ └───────────┘  │  │
//!                              │  │  ┌─────────────────┐  ┌─────────────────────────┐   │  │
//!                              │  │  │   resilience    │  │       lifecycle         │   │  │
//!                              │  │  │ circuit breaker │  │   startup/shutdown      │   │  │
//!                              │  │  └─────────────────┘  └─────────────────────────┘   │  │
//!                              │  └─────────────────────────────────────────────────────┘  │
//!                              └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_balancer::config::load_config;
use edge_balancer::lifecycle::{self, signals, Shutdown};
use edge_balancer::observability::logging;

#[derive(Parser)]
#[command(name = "edge-balancer")]
#[command(about = "HTTP load balancer with circuit breaking, rate limiting and caching", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the file, so fall back to stderr here.
            eprintln!("Could not load config file {}: {}", cli.config.display(), e);
            std::process::exit(1);
        }
    };

    logging::init(&config.monitoring);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "edge-balancer starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    if let Err(e) = lifecycle::run(config, shutdown).await {
        tracing::error!(error = %e, "Fatal error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
