//! HTTP layer subsystem.
//!
//! # Data Flow
//! ```text
//! Bound std::net::TcpListener
//!     → net::IdleAcceptor (inactivity deadline)
//!     → server.rs (transport: plain / TLS / SNI)
//!     → hyper-util auto builder (HTTP/1.1 + HTTP/2)
//!     → caller Router wrapped in TraceLayer
//! ```

pub mod server;

pub use server::{build_router, Transport};
