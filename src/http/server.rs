//! HTTP serving for a bound listener.
//!
//! # Responsibilities
//! - Wrap the caller's handler with the listener's middleware
//! - Put the inactivity deadline under every accepted socket
//! - Tune HTTP/1.1 and HTTP/2 keep-alive timers
//! - Drive the accept loop over plaintext, TLS or SNI-dispatched TLS

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::accept::DefaultAcceptor;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use axum_server::Handle;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use rustls::ServerConfig;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::ListenerSpec;
use crate::net::IdleAcceptor;
use crate::tls::SniAcceptor;

/// How a listener terminates connections.
pub enum Transport {
    Plain,
    /// One secure context for every connection.
    Tls(Arc<ServerConfig>),
    /// Secure context chosen per connection from the server name.
    Sni(SniAcceptor),
}

impl Transport {
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Plain => "plain",
            Transport::Tls(_) => "tls",
            Transport::Sni(_) => "sni",
        }
    }
}

/// Build the Axum router for a listener with all middleware layers.
pub fn build_router(spec: &ListenerSpec) -> Router {
    spec.handler.clone().layer(TraceLayer::new_for_http())
}

/// Serve `spec` on an already bound listener.
///
/// The returned task ends once `handle` has been told to shut down and the
/// remaining connections are gone.
pub fn spawn(
    listener: std::net::TcpListener,
    transport: Transport,
    spec: &ListenerSpec,
    handle: Handle,
) -> JoinHandle<io::Result<()>> {
    let app = build_router(spec).into_make_service_with_connect_info::<SocketAddr>();
    let keep_alive = spec.keep_alive;
    let idle = spec.timeout;

    match transport {
        Transport::Plain => {
            let mut server = axum_server::from_tcp(listener)
                .acceptor(IdleAcceptor::new(DefaultAcceptor::new(), idle))
                .handle(handle);
            tune_connections(server.http_builder(), keep_alive);
            tokio::spawn(async move { server.serve(app).await })
        }
        Transport::Tls(config) => {
            let acceptor = RustlsAcceptor::new(RustlsConfig::from_config(config))
                .acceptor(IdleAcceptor::new(DefaultAcceptor::new(), idle));
            let mut server = axum_server::from_tcp(listener)
                .acceptor(acceptor)
                .handle(handle);
            tune_connections(server.http_builder(), keep_alive);
            tokio::spawn(async move { server.serve(app).await })
        }
        Transport::Sni(acceptor) => {
            let mut server = axum_server::from_tcp(listener)
                .acceptor(IdleAcceptor::new(acceptor, idle))
                .handle(handle);
            tune_connections(server.http_builder(), keep_alive);
            tokio::spawn(async move { server.serve(app).await })
        }
    }
}

/// Apply the idle keep-alive timeout to both protocol versions.
///
/// HTTP/1.1 gets a header read deadline for the next request; HTTP/2 pings
/// idle connections and drops them when the ping goes unanswered.
fn tune_connections(builder: &mut Builder<TokioExecutor>, keep_alive: Option<Duration>) {
    let Some(idle) = keep_alive else {
        return;
    };
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(idle);
    builder
        .http2()
        .timer(TokioTimer::new())
        .keep_alive_interval(idle)
        .keep_alive_timeout(idle);
}
