//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! config, tls, net, lifecycle produce:
//!     → tracing events (target `multiserve`)
//!     → metrics.rs (listener and handshake counters)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
