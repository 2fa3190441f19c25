//! Secure context construction.
//!
//! Turns resolved PEM material into a `rustls::ServerConfig`. Several
//! cert/key pairs may be configured at once (e.g. RSA and ECDSA); the
//! handshake then serves the first pair whose key can sign with a scheme
//! the client offered.

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{ClientHello, ResolvesServerCert, WebPkiClientVerifier};
use rustls::sign::CertifiedKey;
use rustls::{RootCertStore, ServerConfig};

use crate::config::schema::{CertInput, OneOrMany, SniEntry};
use crate::tls::ciphers::{normalize_ciphers, provider_for};
use crate::tls::pem::{self, Pem, ResolvedCert};
use crate::tls::{TlsError, MIN_PROTOCOL_VERSION, PROTOCOL_VERSIONS};

/// Everything needed to build one secure context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub key: Option<OneOrMany<Pem>>,
    pub cert: Option<CertInput>,
    pub ca: Option<OneOrMany<Pem>>,
    /// Canonical cipher list (see `normalize_ciphers`).
    pub ciphers: String,
    pub honor_cipher_order: bool,
    pub request_cert: bool,
    pub reject_unauthorized: bool,
    pub alpn: Vec<Vec<u8>>,
}

impl ContextOptions {
    /// Whether a certificate and key are both configured.
    pub fn has_credentials(&self) -> bool {
        self.key.is_some() && self.cert.is_some()
    }

    /// Options for one SNI host: its own fields where set, these otherwise.
    pub fn for_host(&self, entry: &SniEntry) -> ContextOptions {
        ContextOptions {
            key: entry.key.clone().or_else(|| self.key.clone()),
            cert: entry.cert.clone().or_else(|| self.cert.clone()),
            ca: entry.ca.clone().or_else(|| self.ca.clone()),
            ciphers: entry
                .ciphers
                .as_ref()
                .map(|c| normalize_ciphers(Some(c)))
                .unwrap_or_else(|| self.ciphers.clone()),
            honor_cipher_order: entry.honor_cipher_order.unwrap_or(self.honor_cipher_order),
            request_cert: self.request_cert,
            reject_unauthorized: self.reject_unauthorized,
            alpn: self.alpn.clone(),
        }
    }
}

/// Build a server config from `options`, reading files under `root`.
pub async fn build(root: &Path, options: &ContextOptions) -> Result<Arc<ServerConfig>, TlsError> {
    let key = options.key.as_ref().ok_or(TlsError::MissingKey)?;
    let cert = options.cert.as_ref().ok_or(TlsError::MissingCert)?;

    let certs = pem::resolve_cert(root, cert, key).await?;
    let keys = pem::resolve_all(root, key).await?;
    let ca = pem::resolve_ca(root, options.ca.as_ref()).await?;

    let provider = Arc::new(provider_for(&options.ciphers));
    let credentials = Credentials::load(certs, keys, &provider)?;

    let roots = ca.map(|blobs| load_roots(&blobs)).transpose()?;

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(PROTOCOL_VERSIONS)?;

    let builder = if options.request_cert {
        let roots = roots.ok_or(TlsError::MissingCa)?;
        let mut verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider);
        if !options.reject_unauthorized {
            verifier = verifier.allow_unauthenticated();
        }
        let verifier = verifier
            .build()
            .map_err(|e| TlsError::Verifier(e.to_string()))?;
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };

    let mut config = builder.with_cert_resolver(Arc::new(credentials));
    config.ignore_client_order = options.honor_cipher_order;
    config.alpn_protocols = options.alpn.clone();

    tracing::debug!(
        min_version = ?MIN_PROTOCOL_VERSION.version,
        client_auth = options.request_cert,
        "Secure context built"
    );

    Ok(Arc::new(config))
}

/// One or more certificate chains with their signing keys.
#[derive(Debug)]
pub struct Credentials {
    keys: Vec<Arc<CertifiedKey>>,
}

impl Credentials {
    /// Pair resolved chains with resolved keys.
    pub fn load(
        certs: ResolvedCert,
        keys: OneOrMany<Vec<u8>>,
        provider: &CryptoProvider,
    ) -> Result<Self, TlsError> {
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = match (certs, keys) {
            (ResolvedCert::Single(chain), OneOrMany::One(key)) => vec![(chain, key)],
            (ResolvedCert::Pairs(chains), OneOrMany::Many(keys)) if chains.len() == keys.len() => {
                chains.into_iter().zip(keys).collect()
            }
            (certs, keys) => {
                let certs = match certs {
                    ResolvedCert::Single(_) => 1,
                    ResolvedCert::Pairs(chains) => chains.len(),
                };
                return Err(TlsError::CredentialCount {
                    certs,
                    keys: keys.len(),
                });
            }
        };

        let keys = pairs
            .iter()
            .map(|(chain, key)| certified_key(chain, key, provider).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Err(TlsError::NoCertificates);
        }

        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl ResolvesServerCert for Credentials {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let schemes = client_hello.signature_schemes();
        self.keys
            .iter()
            .find(|ck| ck.key.choose_scheme(schemes).is_some())
            .or_else(|| self.keys.first())
            .cloned()
    }
}

fn certified_key(
    chain: &[u8],
    key: &[u8],
    provider: &CryptoProvider,
) -> Result<CertifiedKey, TlsError> {
    let certs = parse_certs(chain)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    let key = parse_key(key)?;
    let signing_key = provider.key_provider.load_private_key(key)?;
    Ok(CertifiedKey::new(certs, signing_key))
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = pem;
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Pem)
}

fn parse_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = pem;
    rustls_pemfile::private_key(&mut reader)
        .map_err(TlsError::Pem)?
        .ok_or(TlsError::NoPrivateKey)
}

fn load_roots(blobs: &[Vec<u8>]) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();
    for blob in blobs {
        for cert in parse_certs(blob)? {
            roots.add(cert)?;
        }
    }
    if roots.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    tracing::debug!(count = roots.len(), "Loaded CA certificates");
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn self_signed(name: &str) -> (String, String) {
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec![name.to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        (cert.pem(), key.serialize_pem())
    }

    fn options(cert: &str, key: &str) -> ContextOptions {
        ContextOptions {
            key: Some(OneOrMany::One(Pem::from(key))),
            cert: Some(OneOrMany::One(OneOrMany::One(Pem::from(cert)))),
            ca: None,
            ciphers: crate::tls::DEFAULT_CIPHERS.to_string(),
            honor_cipher_order: true,
            request_cert: false,
            reject_unauthorized: true,
            alpn: vec![b"http/1.1".to_vec()],
        }
    }

    #[tokio::test]
    async fn builds_from_inline_material() {
        let (cert, key) = self_signed("localhost");
        let config = build(Path::new("."), &options(&cert, &key)).await.unwrap();
        assert!(config.ignore_client_order);
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let (cert, _) = self_signed("localhost");
        let mut opts = options(&cert, "unused");
        opts.key = None;
        let err = build(Path::new("."), &opts).await.unwrap_err();
        assert!(matches!(err, TlsError::MissingKey));
    }

    #[tokio::test]
    async fn request_cert_requires_ca() {
        let (cert, key) = self_signed("localhost");
        let mut opts = options(&cert, &key);
        opts.request_cert = true;
        let err = build(Path::new("."), &opts).await.unwrap_err();
        assert!(matches!(err, TlsError::MissingCa));

        opts.ca = Some(OneOrMany::One(Pem::from(cert.as_str())));
        build(Path::new("."), &opts).await.unwrap();
    }

    #[test]
    fn parallel_pairs_must_line_up() {
        let (cert_a, key_a) = self_signed("a.test");
        let (cert_b, key_b) = self_signed("b.test");
        let provider = rustls::crypto::ring::default_provider();

        let credentials = Credentials::load(
            ResolvedCert::Pairs(vec![cert_a.clone().into_bytes(), cert_b.into_bytes()]),
            OneOrMany::Many(vec![key_a.clone().into_bytes(), key_b.into_bytes()]),
            &provider,
        )
        .unwrap();
        assert_eq!(credentials.len(), 2);

        let err = Credentials::load(
            ResolvedCert::Pairs(vec![cert_a.into_bytes()]),
            OneOrMany::Many(vec![key_a.clone().into_bytes(), key_a.into_bytes()]),
            &provider,
        )
        .unwrap_err();
        assert!(matches!(err, TlsError::CredentialCount { certs: 1, keys: 2 }));
    }

    #[test]
    fn garbage_key_is_rejected() {
        let (cert, _) = self_signed("localhost");
        let provider = rustls::crypto::ring::default_provider();
        let err = Credentials::load(
            ResolvedCert::Single(cert.into_bytes()),
            OneOrMany::One(b"not a key".to_vec()),
            &provider,
        )
        .unwrap_err();
        assert!(matches!(err, TlsError::NoPrivateKey));
    }

    #[test]
    fn host_overrides_fall_back_to_listener() {
        let base = options("base.pem", "base.key");
        let entry = SniEntry {
            cert: Some(OneOrMany::One(OneOrMany::One(Pem::from("host.pem")))),
            ciphers: Some(OneOrMany::Many(vec!["A".into(), "B".into()])),
            ..SniEntry::default()
        };
        let host = base.for_host(&entry);
        assert_eq!(host.key, base.key);
        assert_ne!(host.cert, base.cert);
        assert_eq!(host.ciphers, "A:B");
        assert_eq!(host.honor_cipher_order, base.honor_cipher_order);
    }
}
