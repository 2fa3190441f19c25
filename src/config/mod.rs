//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or ServersConfig built in code
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServersConfig + handler attached by the caller
//!     → normalize.rs (one ListenerSpec per listener, shape kept)
//!     → lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once normalized
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod normalize;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use normalize::{ListenerSpec, Shape, Shaped, TlsSettings};
pub use schema::{ListenerEntry, ListenerOptions, OneOrMany, ProtocolClass, ServersConfig, SniEntry};
