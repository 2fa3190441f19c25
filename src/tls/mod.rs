//! TLS subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerOptions (key / cert / ca / ciphers / sni)
//!     → pem.rs (inline or file material → PEM bytes)
//!     → ciphers.rs (canonical cipher list → rustls suites)
//!     → context.rs (PEM bytes → rustls::ServerConfig)
//!     → sni.rs (hostname patterns → per-host ServerConfig table)
//! ```
//!
//! # Design Decisions
//! - Every secure context is built once, before the socket is bound
//! - Protocol floor is fixed at TLS 1.2 regardless of caller input
//! - Credential read errors always surface; they are never replaced by
//!   a fallback certificate

use std::path::PathBuf;

use rustls::SupportedProtocolVersion;
use thiserror::Error;

pub mod ciphers;
pub mod context;
pub mod pem;
pub mod sni;

pub use ciphers::{normalize_ciphers, DEFAULT_CIPHERS};
pub use context::ContextOptions;
pub use pem::{Pem, ResolvedCert};
pub use sni::{HostPattern, SniAcceptor, SniDispatch, SniError};

/// Lowest protocol version any listener will negotiate.
pub static MIN_PROTOCOL_VERSION: &SupportedProtocolVersion = &rustls::version::TLS12;

/// Versions offered by every secure context, newest first.
pub static PROTOCOL_VERSIONS: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// Errors raised while building a secure context.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A credential file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PEM data could not be parsed.
    #[error("invalid PEM data: {0}")]
    Pem(#[source] std::io::Error),

    #[error("no certificates found in certificate material")]
    NoCertificates,

    #[error("no private key found in key material")]
    NoPrivateKey,

    #[error("secure listener has no private key configured")]
    MissingKey,

    #[error("secure listener has no certificate configured")]
    MissingCert,

    /// Parallel cert/key arrays of different lengths.
    #[error("{certs} certificate chain(s) configured for {keys} key(s)")]
    CredentialCount { certs: usize, keys: usize },

    /// Client certificates were requested without a CA to check them.
    #[error("request_cert is set but no ca is configured")]
    MissingCa,

    #[error("client certificate verifier: {0}")]
    Verifier(String),

    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),
}
