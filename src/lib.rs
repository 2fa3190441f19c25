//! Multi-listener HTTP/HTTPS/HTTP2 server bring-up.
//!
//! One `ServersConfig` describes any number of plaintext, TLS and
//! HTTP/2-over-TLS listeners. `create_servers` normalizes it, builds every
//! secure context (including per-hostname SNI contexts), binds every socket
//! concurrently and returns all listeners that came up along with every
//! error for those that did not.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod tls;

pub use config::schema::ServersConfig;
pub use config::{load_config, ConfigError, ProtocolClass, Shaped};
pub use lifecycle::{create_servers, create_servers_with, CreateServersError, ListenFailure, Servers};
pub use net::{ListenError, ListenerHandle};
pub use tls::{SniError, TlsError};
