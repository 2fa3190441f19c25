//! Name-based virtual hosting.
//!
//! # Responsibilities
//! - Compile hostname patterns once per listener
//! - Build one secure context per pattern before the listener binds
//! - Pick the context for each handshake from the ClientHello server name
//!
//! # Design Decisions
//! - Matching is case-insensitive
//! - First match wins, in configured order; `*` should come last
//! - A miss fails that one handshake, never the listener

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum_server::accept::Accept;
use futures_util::future::{try_join_all, BoxFuture};
use rustls::server::Acceptor;
use rustls::ServerConfig;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;
use tokio_rustls::LazyConfigAcceptor;

use crate::config::normalize::TlsSettings;
use crate::observability::metrics;
use crate::tls::{context, TlsError};

/// How long a client may take to complete the handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while selecting a context for a connection.
#[derive(Debug, Error)]
pub enum SniError {
    #[error("unrecognized hostname: {0}")]
    UnrecognizedHostname(String),

    /// The client sent no server name and the listener has no default
    /// certificate.
    #[error("client did not send a server name")]
    MissingServerName,
}

/// A compiled hostname pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    /// `*`: matches every hostname.
    Any,
    /// `*.example.org`: the domain itself or any name below it.
    Wildcard { suffix: String },
    /// A literal hostname.
    Exact(String),
}

impl HostPattern {
    pub fn compile(pattern: &str) -> Self {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern == "*" {
            return HostPattern::Any;
        }
        match pattern.strip_prefix("*.") {
            Some(suffix) => HostPattern::Wildcard {
                suffix: suffix.to_string(),
            },
            None => HostPattern::Exact(pattern),
        }
    }

    pub fn matches(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        match self {
            HostPattern::Any => true,
            HostPattern::Exact(name) => hostname == *name,
            HostPattern::Wildcard { suffix } => {
                if hostname == *suffix {
                    return true;
                }
                match hostname.strip_suffix(suffix.as_str()) {
                    Some(labels) => labels
                        .strip_suffix('.')
                        .is_some_and(|labels| !labels.is_empty() && labels.split('.').all(|l| !l.is_empty())),
                    None => false,
                }
            }
        }
    }
}

/// Pre-built hostname → secure context table for one listener.
#[derive(Debug)]
pub struct SniDispatch {
    hosts: Vec<(HostPattern, Arc<ServerConfig>)>,
    default: Option<Arc<ServerConfig>>,
}

impl SniDispatch {
    /// Compile every pattern and build its context.
    ///
    /// Per-host fields that are unset fall back to the listener's own
    /// key, cert, ca, ciphers and cipher order. The listener's own context
    /// is built too when it has a key and certificate; it serves clients
    /// that send no server name.
    pub async fn build(settings: &TlsSettings) -> Result<Self, TlsError> {
        let root = settings.root.as_path();

        let hosts = try_join_all(settings.sni.iter().map(|(pattern, entry)| async move {
            let options = settings.defaults.for_host(entry);
            let config = context::build(root, &options).await?;
            tracing::debug!(pattern = %pattern, "Registered SNI context");
            Ok::<_, TlsError>((HostPattern::compile(pattern), config))
        }))
        .await?;

        let default = if settings.defaults.has_credentials() {
            Some(context::build(root, &settings.defaults).await?)
        } else {
            None
        };

        tracing::info!(
            hosts = hosts.len(),
            has_default = default.is_some(),
            "SNI dispatch ready"
        );

        Ok(Self { hosts, default })
    }

    /// Context for `hostname`, first matching pattern wins.
    pub fn lookup(&self, hostname: &str) -> Result<Arc<ServerConfig>, SniError> {
        self.hosts
            .iter()
            .find(|(pattern, _)| pattern.matches(hostname))
            .map(|(_, config)| Arc::clone(config))
            .ok_or_else(|| SniError::UnrecognizedHostname(hostname.to_string()))
    }

    /// Context for a ClientHello that may or may not carry a server name.
    pub fn select(&self, server_name: Option<&str>) -> Result<Arc<ServerConfig>, SniError> {
        match server_name {
            Some(name) => self.lookup(name),
            None => self.default.clone().ok_or(SniError::MissingServerName),
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Acceptor that reads the ClientHello before choosing a secure context.
#[derive(Debug, Clone)]
pub struct SniAcceptor {
    dispatch: Arc<SniDispatch>,
}

impl SniAcceptor {
    pub fn new(dispatch: SniDispatch) -> Self {
        Self {
            dispatch: Arc::new(dispatch),
        }
    }

    pub fn dispatch(&self) -> &SniDispatch {
        &self.dispatch
    }

    async fn handshake<I>(dispatch: Arc<SniDispatch>, stream: I) -> io::Result<TlsStream<I>>
    where
        I: AsyncRead + AsyncWrite + Unpin,
    {
        let start = LazyConfigAcceptor::new(Acceptor::default(), stream).await?;

        let selected = {
            let hello = start.client_hello();
            let server_name = hello.server_name().map(str::to_owned);
            dispatch.select(server_name.as_deref()).map_err(|err| {
                tracing::warn!(server_name = ?server_name, error = %err, "Rejecting TLS handshake");
                metrics::record_sni_miss();
                err
            })
        };
        let config = selected.map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        start.into_stream(config).await
    }
}

impl<I, S> Accept<I, S> for SniAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TlsStream<I>;
    type Service = S;
    type Future = BoxFuture<'static, io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let dispatch = Arc::clone(&self.dispatch);
        Box::pin(async move {
            let handshake = Self::handshake(dispatch, stream);
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
                Ok(Ok(stream)) => {
                    metrics::record_handshake("ok");
                    Ok((stream, service))
                }
                Ok(Err(err)) => {
                    metrics::record_handshake("error");
                    Err(err)
                }
                Err(_) => {
                    metrics::record_handshake("timeout");
                    Err(io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))
                }
            }
        })
    }
}
