//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     ServersConfig → normalize → start every listener concurrently
//!     → Servers | CreateServersError (with the listeners that did start)
//!
//! Shutdown (shutdown.rs):
//!     Stop accepting → Drain connections (bounded by grace) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Listeners start together; none waits on another
//! - Shutdown has timeout: connections are dropped after the grace period

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use signals::shutdown_signal;
pub use startup::{create_servers, create_servers_with, CreateServersError, ListenFailure, Servers};
