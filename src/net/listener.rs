//! TCP binding and live listener handles.
//!
//! # Responsibilities
//! - Bind the configured host:port and confirm the local address
//! - Own the serving task and its shutdown handle
//! - Describe why a listener could not be brought up

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum_server::Handle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, ProtocolClass};
use crate::observability::metrics;
use crate::tls::TlsError;

/// Bind address used when neither the listener nor the defaults set a host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Why a single listener failed to start.
#[derive(Debug)]
pub enum ListenError {
    /// The listener's configuration could not be normalized.
    Config(ConfigError),
    /// Credentials could not be loaded or a secure context not built.
    Tls(TlsError),
    /// The socket could not be bound.
    Bind { address: String, source: io::Error },
}

impl fmt::Display for ListenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenError::Config(e) => write!(f, "Invalid listener configuration: {}", e),
            ListenError::Tls(e) => write!(f, "Failed to build secure context: {}", e),
            ListenError::Bind { address, source } => {
                write!(f, "Failed to bind {}: {}", address, source)
            }
        }
    }
}

impl std::error::Error for ListenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenError::Config(e) => Some(e),
            ListenError::Tls(e) => Some(e),
            ListenError::Bind { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for ListenError {
    fn from(e: ConfigError) -> Self {
        ListenError::Config(e)
    }
}

impl From<TlsError> for ListenError {
    fn from(e: TlsError) -> Self {
        ListenError::Tls(e)
    }
}

impl ListenError {
    /// Short label used for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            ListenError::Config(_) => "config",
            ListenError::Tls(_) => "tls",
            ListenError::Bind { .. } => "bind",
        }
    }

    /// The underlying OS error kind for bind failures.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            ListenError::Bind { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Bind `host:port` and hand back a std listener ready for the server.
///
/// The socket is listening once this returns, so connection attempts queue
/// up even before the serving task is polled.
pub async fn bind(host: Option<&str>, port: u16) -> Result<(std::net::TcpListener, SocketAddr), ListenError> {
    let host = host.unwrap_or(DEFAULT_HOST);
    let address = format!("{}:{}", host, port);
    let bind_error = |source| ListenError::Bind {
        address: address.clone(),
        source,
    };

    let listener = TcpListener::bind((host, port)).await.map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;
    let listener = listener.into_std().map_err(bind_error)?;

    tracing::debug!(address = %local_addr, "Socket bound");

    Ok((listener, local_addr))
}

/// A listener that is bound and serving.
///
/// Dropping the handle leaves the listener running; call `shutdown` or
/// `close` to stop it.
pub struct ListenerHandle {
    class: ProtocolClass,
    local_addr: SocketAddr,
    handle: Handle,
    task: JoinHandle<io::Result<()>>,
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("class", &self.class)
            .field("local_addr", &self.local_addr)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl ListenerHandle {
    pub fn new(
        class: ProtocolClass,
        local_addr: SocketAddr,
        handle: Handle,
        task: JoinHandle<io::Result<()>>,
    ) -> Self {
        Self {
            class,
            local_addr,
            handle,
            task,
        }
    }

    pub fn class(&self) -> ProtocolClass {
        self.class
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The bound port; the OS-assigned one when port 0 was requested.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Connections currently being served.
    pub fn connection_count(&self) -> usize {
        self.handle.connection_count()
    }

    /// Stop accepting immediately and drop open connections.
    pub fn close(&self) {
        self.handle.shutdown();
    }

    /// Stop accepting, let open connections finish for up to `grace`, then
    /// wait for the serving task to exit.
    pub async fn shutdown(self, grace: Option<Duration>) -> io::Result<()> {
        tracing::info!(
            class = %self.class,
            address = %self.local_addr,
            connections = self.handle.connection_count(),
            "Shutting down listener"
        );
        self.handle.graceful_shutdown(grace);
        let result = self.task.await.map_err(io::Error::other)?;
        metrics::record_listener_stopped(self.class);
        result
    }
}
