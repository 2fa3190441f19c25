//! Listener configuration normalization.
//!
//! # Responsibilities
//! - Expand every protocol class into one `ListenerSpec` per listener
//! - Apply inheritance from the top-level defaults (host, handler, timeouts)
//! - Fold TLS fields into a `TlsSettings` for secure classes
//! - Remember whether each class was written as a single value or an array
//!
//! # Design Decisions
//! - Runs before any I/O; nothing here touches the filesystem or network
//! - Per-listener problems (bad port, no handler) fail that element only
//! - A configuration that requests no class at all is the one fatal case

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use crate::config::loader::ConfigError;
use crate::config::schema::{
    ListenerEntry, ListenerOptions, OneOrMany, ProtocolClass, ServersConfig, SniTable,
};
use crate::tls::{normalize_ciphers, ContextOptions};

/// Whether a value was configured once or as an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Single,
    Many,
}

impl Shape {
    pub fn of<T>(value: &OneOrMany<T>) -> Self {
        if value.is_many() {
            Shape::Many
        } else {
            Shape::Single
        }
    }
}

/// Output that mirrors the shape of its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shaped<T> {
    Single(T),
    Many(Vec<T>),
}

impl<T> Shaped<T> {
    /// Rebuild a value of `shape` from collected items.
    ///
    /// `Single` takes the first item; an empty `Single` yields `None`.
    /// `Many` always succeeds, even when empty.
    pub fn collect(shape: Shape, items: Vec<T>) -> Option<Self> {
        match shape {
            Shape::Single => items.into_iter().next().map(Shaped::Single),
            Shape::Many => Some(Shaped::Many(items)),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Shaped::Single(_) => Shape::Single,
            Shaped::Many(_) => Shape::Many,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            Shaped::Single(item) => std::slice::from_ref(item),
            Shaped::Many(items) => items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Shaped::Single(item) => vec![item],
            Shaped::Many(items) => items,
        }
    }

    /// The single item, or `None` for the array form.
    pub fn single(&self) -> Option<&T> {
        match self {
            Shaped::Single(item) => Some(item),
            Shaped::Many(_) => None,
        }
    }
}

/// Everything a secure listener needs to build its contexts.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    /// Directory that relative credential paths resolve against.
    pub root: PathBuf,
    /// The listener's own key, cert, ca, cipher and client-auth settings.
    pub defaults: ContextOptions,
    /// Hostname patterns in match order.
    pub sni: SniTable,
}

impl TlsSettings {
    pub fn has_sni(&self) -> bool {
        !self.sni.is_empty()
    }
}

/// One fully resolved listener.
#[derive(Debug, Clone)]
pub struct ListenerSpec {
    pub class: ProtocolClass,
    pub host: Option<String>,
    pub port: u16,
    pub handler: Router,
    /// Socket inactivity timeout. `None` disables it.
    pub timeout: Option<Duration>,
    /// Idle keep-alive timeout. `None` keeps the server defaults.
    pub keep_alive: Option<Duration>,
    /// Present for secure classes only.
    pub tls: Option<Arc<TlsSettings>>,
}

/// All listeners of one requested class.
#[derive(Debug)]
pub struct ClassPlan {
    pub class: ProtocolClass,
    pub shape: Shape,
    pub listeners: Vec<Result<ListenerSpec, ConfigError>>,
}

/// The normalized form of a whole `ServersConfig`.
#[derive(Debug, Default)]
pub struct ListenerPlan {
    pub classes: Vec<ClassPlan>,
}

impl ListenerPlan {
    pub fn class(&self, class: ProtocolClass) -> Option<&ClassPlan> {
        self.classes.iter().find(|plan| plan.class == class)
    }

    /// Number of listeners across every class, including failed ones.
    pub fn len(&self) -> usize {
        self.classes.iter().map(|plan| plan.listeners.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize every requested class.
///
/// Fails only when no class is requested at all.
pub fn normalize(config: &ServersConfig) -> Result<ListenerPlan, ConfigError> {
    let classes: Vec<ClassPlan> = ProtocolClass::ALL
        .iter()
        .filter_map(|&class| normalize_class(class, config))
        .collect();

    if classes.is_empty() {
        return Err(ConfigError::NoListeners);
    }

    Ok(ListenerPlan { classes })
}

/// Normalize one class, or `None` when the class is not requested.
pub fn normalize_class(class: ProtocolClass, config: &ServersConfig) -> Option<ClassPlan> {
    let entries = config.entries(class)?;
    let listeners = entries
        .as_slice()
        .iter()
        .map(|entry| {
            if class.is_secure() {
                normalize_secure(class, entry, config)
            } else {
                normalize_plain(entry, config)
            }
        })
        .collect();

    Some(ClassPlan {
        class,
        shape: Shape::of(entries),
        listeners,
    })
}

/// Normalize one plaintext listener.
pub fn normalize_plain(entry: &ListenerEntry, base: &ServersConfig) -> Result<ListenerSpec, ConfigError> {
    let options = expand(entry);
    base_spec(ProtocolClass::Http, &options, base)
}

/// Normalize one secure listener of `class`.
pub fn normalize_secure(
    class: ProtocolClass,
    entry: &ListenerEntry,
    base: &ServersConfig,
) -> Result<ListenerSpec, ConfigError> {
    let options = expand(entry);
    let mut spec = base_spec(class, &options, base)?;
    spec.tls = Some(Arc::new(tls_settings(class, &options)));
    Ok(spec)
}

fn expand(entry: &ListenerEntry) -> ListenerOptions {
    match entry {
        ListenerEntry::Port(port) => ListenerOptions {
            port: Some(port.clone()),
            ..ListenerOptions::default()
        },
        ListenerEntry::Options(options) => options.as_ref().clone(),
    }
}

fn base_spec(
    class: ProtocolClass,
    options: &ListenerOptions,
    base: &ServersConfig,
) -> Result<ListenerSpec, ConfigError> {
    let port = match &options.port {
        None => class.default_port(),
        Some(value) => value.parse().ok_or_else(|| ConfigError::InvalidPort {
            class,
            value: value.to_string(),
        })?,
    };

    let handler = options
        .handler
        .clone()
        .or_else(|| base.handler.clone())
        .ok_or(ConfigError::MissingHandler { class })?;

    Ok(ListenerSpec {
        class,
        host: options.host.clone().or_else(|| base.host.clone()),
        port,
        handler,
        timeout: millis(options.timeout.or(base.timeout)),
        keep_alive: millis(options.keep_alive_timeout.or(base.keep_alive_timeout)),
        tls: None,
    })
}

fn tls_settings(class: ProtocolClass, options: &ListenerOptions) -> TlsSettings {
    let alpn = match &options.alpn {
        Some(protocols) => protocols.iter().map(|p| p.as_bytes().to_vec()).collect(),
        None => default_alpn(class),
    };

    TlsSettings {
        root: options.root.clone().unwrap_or_else(|| PathBuf::from(".")),
        defaults: ContextOptions {
            key: options.key.clone(),
            cert: options.cert.clone(),
            ca: options.ca.clone(),
            ciphers: normalize_ciphers(options.ciphers.as_ref()),
            honor_cipher_order: options.honor_cipher_order.unwrap_or(false),
            request_cert: options.request_cert,
            reject_unauthorized: options.reject_unauthorized.unwrap_or(true),
            alpn,
        },
        sni: options.sni.clone(),
    }
}

/// ALPN protocols advertised by a class when the listener sets none.
pub fn default_alpn(class: ProtocolClass) -> Vec<Vec<u8>> {
    match class {
        ProtocolClass::Http => Vec::new(),
        ProtocolClass::Https => vec![b"http/1.1".to_vec()],
        ProtocolClass::Http2 => vec![b"h2".to_vec(), b"http/1.1".to_vec()],
    }
}

// Zero disables the timeout.
fn millis(value: Option<u64>) -> Option<Duration> {
    value.filter(|ms| *ms > 0).map(Duration::from_millis)
}
