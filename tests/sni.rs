//! Name-based virtual hosting and protocol negotiation over live sockets.

mod common;

use std::time::Duration;

use multiserve::config::{ListenerEntry, OneOrMany, ServersConfig, SniEntry};
use multiserve::tls::Pem;
use multiserve::{create_servers, Servers};

use common::{hello, local, secure, Issued, TestCa};

fn entry(issued: &Issued) -> SniEntry {
    SniEntry {
        key: Some(OneOrMany::One(Pem::from(issued.key.clone()))),
        cert: Some(OneOrMany::One(OneOrMany::One(Pem::from(issued.cert.clone())))),
        ..SniEntry::default()
    }
}

async fn start(https: ListenerEntry) -> Servers {
    let config = ServersConfig {
        https: Some(OneOrMany::One(https)),
        ..ServersConfig::default()
    }
    .with_handler(hello());
    create_servers(config).await.unwrap()
}

#[tokio::test]
async fn hostnames_select_their_certificates() {
    let ca = TestCa::new();
    let wildcard = ca.issue(&["*.example.org", "example.org"]);
    let api = ca.issue(&["api.test"]);

    let mut options = local(0);
    options.sni.push("api.test", entry(&api));
    options.sni.push("*.example.org", entry(&wildcard));

    let servers = start(options.into()).await;
    let addr = servers.iter().next().unwrap().local_addr();
    let hosts = ["api.test", "foo.example.org", "www.example.org", "example.org"];
    let client = common::client(&ca.pem(), &hosts, addr);

    for host in hosts {
        let body = client
            .get(format!("https://{}:{}/", host, addr.port()))
            .send()
            .await
            .unwrap_or_else(|e| panic!("{} failed: {}", host, e))
            .text()
            .await
            .unwrap();
        assert_eq!(body, "hello");
    }

    servers.shutdown(Some(Duration::from_secs(1))).await;
}

#[tokio::test]
async fn unknown_hostname_fails_only_that_handshake() {
    let ca = TestCa::new();
    let wildcard = ca.issue(&["*.example.org", "example.org"]);

    let mut options = local(0);
    options.sni.push("*.example.org", entry(&wildcard));

    let servers = start(options.into()).await;
    let addr = servers.iter().next().unwrap().local_addr();
    let client = common::client(&ca.pem(), &["example.com", "www.example.org"], addr);

    let miss = client
        .get(format!("https://example.com:{}/", addr.port()))
        .send()
        .await;
    assert!(miss.is_err());

    let hit = client
        .get(format!("https://www.example.org:{}/", addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(hit.text().await.unwrap(), "hello");

    servers.shutdown(None).await;
}

#[tokio::test]
async fn catch_all_pattern_serves_every_name() {
    let ca = TestCa::new();
    let fallback = ca.issue(&["fallback.test", "anything.test"]);

    let mut options = local(0);
    options.sni.push("*", entry(&fallback));

    let servers = start(options.into()).await;
    let addr = servers.iter().next().unwrap().local_addr();
    let client = common::client(&ca.pem(), &["anything.test"], addr);

    let body = client
        .get(format!("https://anything.test:{}/", addr.port()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "hello");

    servers.shutdown(None).await;
}

#[tokio::test]
async fn http2_class_negotiates_h2() {
    let ca = TestCa::new();
    let issued = ca.issue(&["localhost"]);

    let config = ServersConfig {
        https: Some(OneOrMany::One(secure(0, &issued).into())),
        http2: Some(OneOrMany::One(secure(0, &issued).into())),
        ..ServersConfig::default()
    }
    .with_handler(hello());
    let servers = create_servers(config).await.unwrap();

    let h2_addr = servers.http2.as_ref().unwrap().as_slice()[0].local_addr();
    let h1_addr = servers.https.as_ref().unwrap().as_slice()[0].local_addr();

    let response = common::client(&ca.pem(), &["localhost"], h2_addr)
        .get(format!("https://localhost:{}/", h2_addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.version(), reqwest::Version::HTTP_2);

    let response = common::client(&ca.pem(), &["localhost"], h1_addr)
        .get(format!("https://localhost:{}/", h1_addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.version(), reqwest::Version::HTTP_11);

    servers.shutdown(None).await;
}

#[tokio::test]
async fn client_certificates_are_required_when_requested() {
    let ca = TestCa::new();
    let issued = ca.issue(&["localhost"]);

    let mut options = secure(0, &issued);
    options.request_cert = true;
    options.ca = Some(OneOrMany::One(Pem::from(ca.pem())));

    let servers = start(options.into()).await;
    let addr = servers.iter().next().unwrap().local_addr();

    let anonymous = common::client(&ca.pem(), &["localhost"], addr)
        .get(format!("https://localhost:{}/", addr.port()))
        .send()
        .await;
    assert!(anonymous.is_err());

    servers.shutdown(None).await;
}
