//! Metrics collection and exposition.
//!
//! # Metrics
//! - `multiserve_listeners_started_total` (counter): listeners bound, by class
//! - `multiserve_listeners_failed_total` (counter): listener failures, by class and stage
//! - `multiserve_listeners_active` (gauge): listeners currently serving, by class
//! - `multiserve_tls_handshakes_total` (counter): SNI handshakes, by outcome
//! - `multiserve_sni_misses_total` (counter): handshakes with no matching hostname
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus exporter is opt-in from the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::ProtocolClass;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_listener_started(class: ProtocolClass) {
    ::metrics::counter!("multiserve_listeners_started_total", "class" => class.as_str()).increment(1);
    ::metrics::gauge!("multiserve_listeners_active", "class" => class.as_str()).increment(1.0);
}

pub fn record_listener_stopped(class: ProtocolClass) {
    ::metrics::gauge!("multiserve_listeners_active", "class" => class.as_str()).decrement(1.0);
}

/// `stage` is one of `config`, `tls` or `bind`.
pub fn record_listener_failed(class: ProtocolClass, stage: &'static str) {
    ::metrics::counter!(
        "multiserve_listeners_failed_total",
        "class" => class.as_str(),
        "stage" => stage
    )
    .increment(1);
}

pub fn record_handshake(outcome: &'static str) {
    ::metrics::counter!("multiserve_tls_handshakes_total", "outcome" => outcome).increment(1);
}

pub fn record_sni_miss() {
    ::metrics::counter!("multiserve_sni_misses_total").increment(1);
}
