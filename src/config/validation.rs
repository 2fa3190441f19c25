//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that at least one listener class is requested
//! - Validate value ranges (ports within 0-65535)
//! - Catch client-auth settings that can never work
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Handlers are not checked here: they are attached after loading

use crate::config::loader::ConfigError;
use crate::config::schema::{ListenerEntry, ProtocolClass, ServersConfig};

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &ServersConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if ProtocolClass::ALL.iter().all(|&class| config.entries(class).is_none()) {
        errors.push(ConfigError::NoListeners);
    }

    for class in ProtocolClass::ALL {
        let Some(entries) = config.entries(class) else {
            continue;
        };
        for entry in entries.as_slice() {
            validate_entry(class, entry, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_entry(class: ProtocolClass, entry: &ListenerEntry, errors: &mut Vec<ConfigError>) {
    let (port, options) = match entry {
        ListenerEntry::Port(port) => (Some(port), None),
        ListenerEntry::Options(options) => (options.port.as_ref(), Some(options)),
    };

    if let Some(port) = port {
        if port.parse().is_none() {
            errors.push(ConfigError::InvalidPort {
                class,
                value: port.to_string(),
            });
        }
    }

    if let Some(options) = options {
        if class.is_secure() && options.request_cert && options.ca.is_none() {
            errors.push(ConfigError::ClientAuthWithoutCa { class });
        }
    }
}
