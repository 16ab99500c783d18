//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack, route table)
//!     → request.rs (request ID, client IP)
//!     → engine (pipeline) or admin API
//!     → response.rs (rejections as status + plain-text body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::Rejection;
pub use server::{AppState, HttpServer};
