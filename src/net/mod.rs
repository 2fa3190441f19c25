//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerSpec (host, port)
//!     → listener.rs (bind, confirm local address)
//!     → http::server (serving task)
//!     → idle.rs (inactivity deadline on every accepted socket)
//!     → ListenerHandle returned to the caller
//!
//! Listener States:
//!     Constructing → Binding → Ready | Failed
//! ```
//!
//! # Design Decisions
//! - Binding happens before the serving task exists, so bind errors are
//!   reported to the caller rather than logged from a background task
//! - The caller owns every handle and decides when to stop it

pub mod idle;
pub mod listener;

pub use idle::{IdleAcceptor, IdleStream};
pub use listener::{bind, ListenError, ListenerHandle, DEFAULT_HOST};
