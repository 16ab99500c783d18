//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream dial
//!     → TCP: hyper-util HttpConnector (shared pool)
//!     → Unix socket: unix.rs connector bound to the backend's socket path
//!     → Hand the stream to the hyper client
//! ```
//!
//! # Design Decisions
//! - One pooled TCP client shared by every HTTP backend
//! - One client per unix-socket backend, since the socket path is the address

pub mod unix;

pub use unix::UnixConnector;
