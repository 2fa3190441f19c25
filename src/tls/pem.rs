//! PEM material resolution.
//!
//! Credentials arrive either inline or as paths relative to a listener's
//! `root`. Everything here turns them into raw PEM bytes; parsing into
//! rustls types happens in `context.rs`.

use std::path::{Path, PathBuf};

use futures_util::future::try_join_all;
use serde::Deserialize;

use crate::config::schema::{CertInput, OneOrMany};
use crate::tls::TlsError;

/// Marker that identifies inline PEM text.
pub const PEM_MARKER: &str = "-----BEGIN";

/// A single piece of credential material.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Pem {
    /// Material given directly.
    Inline(Vec<u8>),
    /// Path to a PEM file, resolved against the listener root.
    File(PathBuf),
}

impl From<String> for Pem {
    fn from(value: String) -> Self {
        if value.contains(PEM_MARKER) {
            Pem::Inline(value.into_bytes())
        } else {
            Pem::File(PathBuf::from(value))
        }
    }
}

impl From<&str> for Pem {
    fn from(value: &str) -> Self {
        Pem::from(value.to_string())
    }
}

impl From<Vec<u8>> for Pem {
    fn from(bytes: Vec<u8>) -> Self {
        Pem::Inline(bytes)
    }
}

impl From<PathBuf> for Pem {
    fn from(path: PathBuf) -> Self {
        Pem::File(path)
    }
}

/// Certificate material after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCert {
    /// One chain, used with a single key.
    Single(Vec<u8>),
    /// One chain per key, positionally matched.
    Pairs(Vec<Vec<u8>>),
}

/// Return the PEM bytes for `value`, reading the file if it is a path.
pub async fn resolve(root: &Path, value: &Pem) -> Result<Vec<u8>, TlsError> {
    match value {
        Pem::Inline(bytes) => Ok(bytes.clone()),
        Pem::File(path) => {
            let full = root.join(path);
            tracing::debug!(path = %full.display(), "Reading credential file");
            tokio::fs::read(&full)
                .await
                .map_err(|source| TlsError::FileRead { path: full, source })
        }
    }
}

/// Resolve every element of `values`, keeping order and shape.
pub async fn resolve_all(
    root: &Path,
    values: &OneOrMany<Pem>,
) -> Result<OneOrMany<Vec<u8>>, TlsError> {
    match values {
        OneOrMany::One(value) => resolve(root, value).await.map(OneOrMany::One),
        OneOrMany::Many(values) => try_join_all(values.iter().map(|v| resolve(root, v)))
            .await
            .map(OneOrMany::Many),
    }
}

/// Resolve certificate material against the shape of `key`.
///
/// - a single certificate (or a single chain) resolves to one blob;
/// - an array of certificates with an array of keys resolves each element
///   as its own chain, positionally matched with the keys;
/// - an array of certificates with a single key is one chain, joined with
///   newlines in order.
pub async fn resolve_cert(
    root: &Path,
    cert: &CertInput,
    key: &OneOrMany<Pem>,
) -> Result<ResolvedCert, TlsError> {
    match (cert, key) {
        (OneOrMany::One(unit), _) => resolve_chain(root, unit).await.map(ResolvedCert::Single),
        (OneOrMany::Many(units), OneOrMany::Many(_)) => {
            try_join_all(units.iter().map(|unit| resolve_chain(root, unit)))
                .await
                .map(ResolvedCert::Pairs)
        }
        (OneOrMany::Many(units), OneOrMany::One(_)) => {
            let parts = units.iter().flat_map(|unit| unit.as_slice());
            let resolved = try_join_all(parts.map(|part| resolve(root, part))).await?;
            Ok(ResolvedCert::Single(join_pem(resolved)))
        }
    }
}

/// Resolve CA material. A single value is treated as a list of one.
pub async fn resolve_ca(
    root: &Path,
    ca: Option<&OneOrMany<Pem>>,
) -> Result<Option<Vec<Vec<u8>>>, TlsError> {
    let Some(ca) = ca else {
        return Ok(None);
    };
    let resolved = try_join_all(ca.as_slice().iter().map(|v| resolve(root, v))).await?;
    Ok(Some(resolved))
}

async fn resolve_chain(root: &Path, unit: &OneOrMany<Pem>) -> Result<Vec<u8>, TlsError> {
    match unit {
        OneOrMany::One(value) => resolve(root, value).await,
        OneOrMany::Many(values) => {
            let resolved = try_join_all(values.iter().map(|v| resolve(root, v))).await?;
            Ok(join_pem(resolved))
        }
    }
}

fn join_pem(parts: Vec<Vec<u8>>) -> Vec<u8> {
    parts.join(&b'\n')
}
