//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{routing::get, Router};
use multiserve::config::{ListenerOptions, OneOrMany};
use multiserve::tls::Pem;
use rcgen::{BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair};

/// Throwaway certificate authority.
pub struct TestCa {
    cert: Certificate,
    key: KeyPair,
}

/// A leaf certificate issued by `TestCa`, as PEM text.
#[derive(Clone)]
pub struct Issued {
    pub cert: String,
    pub key: String,
}

impl TestCa {
    pub fn new() -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(DnType::CommonName, "multiserve test CA");
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// Issue a leaf certificate for `names`.
    pub fn issue(&self, names: &[&str]) -> Issued {
        let key = KeyPair::generate().unwrap();
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let cert = CertificateParams::new(names)
            .unwrap()
            .signed_by(&key, &self.cert, &self.key)
            .unwrap();
        Issued {
            cert: cert.pem(),
            key: key.serialize_pem(),
        }
    }
}

/// Handler that answers every request with `hello`.
pub fn hello() -> Router {
    Router::new().route("/", get(|| async { "hello" }))
}

/// Listener table bound to loopback.
pub fn local(port: u16) -> ListenerOptions {
    ListenerOptions {
        host: Some("127.0.0.1".to_string()),
        ..ListenerOptions::with_port(port)
    }
}

/// Loopback listener table with inline credentials.
#[allow(dead_code)]
pub fn secure(port: u16, issued: &Issued) -> ListenerOptions {
    ListenerOptions {
        key: Some(OneOrMany::One(Pem::from(issued.key.clone()))),
        cert: Some(OneOrMany::One(OneOrMany::One(Pem::from(issued.cert.clone())))),
        ..local(port)
    }
}

/// Client trusting `ca_pem` that sends every `hosts` name to `addr`.
#[allow(dead_code)]
pub fn client(ca_pem: &str, hosts: &[&str], addr: SocketAddr) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .add_root_certificate(reqwest::Certificate::from_pem(ca_pem.as_bytes()).unwrap());
    for host in hosts {
        builder = builder.resolve(host, addr);
    }
    builder.build().unwrap()
}

/// Plaintext client.
#[allow(dead_code)]
pub fn plain_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
