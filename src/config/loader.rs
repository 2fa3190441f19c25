//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ProtocolClass, ServersConfig};
use crate::config::validation::validate_config;

/// Error type for configuration loading and normalization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// None of `http`, `https` or `http2` was configured.
    #[error("no listeners configured: set at least one of http, https or http2")]
    NoListeners,

    #[error("{class} listener has no handler and no default handler is set")]
    MissingHandler { class: ProtocolClass },

    #[error("{class} listener has invalid port {value}")]
    InvalidPort { class: ProtocolClass, value: String },

    #[error("{class} listener sets request_cert without a ca")]
    ClientAuthWithoutCa { class: ProtocolClass },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ConfigError>),
}

fn join(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Handlers cannot be expressed in TOML; attach one with
/// `ServersConfig::with_handler` before starting the servers.
pub fn load_config(path: &Path) -> Result<ServersConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<ServersConfig, ConfigError> {
    let config: ServersConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        http = config.http.is_some(),
        https = config.https.is_some(),
        http2 = config.http2.is_some(),
        "Configuration loaded"
    );

    Ok(config)
}
