//! HTTP load balancer library.

pub mod admin;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod security;

pub use config::Config;
pub use engine::LoadBalancerCore;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
