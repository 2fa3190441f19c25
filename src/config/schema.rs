//! Configuration schema definitions.
//!
//! Every listener field accepts several spellings (a bare port, a table, an
//! array of either). The types here capture those spellings as explicit
//! variants so nothing downstream has to sniff shapes again.
//!
//! The request handler cannot come from a file; it is attached
//! programmatically through the `handler` fields, which serde skips.

use std::fmt;
use std::path::PathBuf;

use axum::Router;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::tls::pem::Pem;

/// A value that may be given once or as an array.
///
/// `Many` is tried first so that an array never gets mistaken for a
/// sequence-shaped struct.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// View the contents as a slice, a single value being a slice of one.
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        OneOrMany::One(value)
    }
}

/// Certificate input: a single PEM source, a chain, or an array of
/// per-key chains (which may themselves be arrays).
pub type CertInput = OneOrMany<OneOrMany<Pem>>;

/// The three listener families this crate can bring up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolClass {
    /// Plaintext HTTP/1.1 (and h2c via prior knowledge).
    Http,
    /// TLS, advertising `http/1.1`.
    Https,
    /// TLS, advertising `h2` first with `http/1.1` fallback.
    Http2,
}

impl ProtocolClass {
    pub const ALL: [ProtocolClass; 3] = [ProtocolClass::Http, ProtocolClass::Https, ProtocolClass::Http2];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolClass::Http => "http",
            ProtocolClass::Https => "https",
            ProtocolClass::Http2 => "http2",
        }
    }

    /// Whether listeners of this class terminate TLS.
    pub fn is_secure(&self) -> bool {
        !matches!(self, ProtocolClass::Http)
    }

    /// Port used when a listener does not name one.
    pub fn default_port(&self) -> u16 {
        if self.is_secure() {
            DEFAULT_HTTPS_PORT
        } else {
            DEFAULT_HTTP_PORT
        }
    }
}

impl fmt::Display for ProtocolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Root configuration: every listener to bring up plus shared defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServersConfig {
    /// Plaintext listener(s).
    pub http: Option<OneOrMany<ListenerEntry>>,

    /// TLS listener(s).
    pub https: Option<OneOrMany<ListenerEntry>>,

    /// TLS listener(s) negotiating HTTP/2 through ALPN.
    pub http2: Option<OneOrMany<ListenerEntry>>,

    /// Default bind address for listeners that do not set one.
    pub host: Option<String>,

    /// Default socket inactivity timeout in milliseconds.
    pub timeout: Option<u64>,

    /// Default idle keep-alive timeout in milliseconds.
    pub keep_alive_timeout: Option<u64>,

    /// Default request handler.
    #[serde(skip)]
    pub handler: Option<Router>,
}

impl ServersConfig {
    /// Entries configured for `class`, if that class was requested.
    pub fn entries(&self, class: ProtocolClass) -> Option<&OneOrMany<ListenerEntry>> {
        match class {
            ProtocolClass::Http => self.http.as_ref(),
            ProtocolClass::Https => self.https.as_ref(),
            ProtocolClass::Http2 => self.http2.as_ref(),
        }
    }

    /// Attach the default handler.
    pub fn with_handler(mut self, handler: Router) -> Self {
        self.handler = Some(handler);
        self
    }
}

/// One listener as written by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListenerEntry {
    /// Port-only shorthand: `http = 8080` or `http = "8080"`.
    Port(PortValue),
    /// Full listener table.
    Options(Box<ListenerOptions>),
}

impl From<u16> for ListenerEntry {
    fn from(port: u16) -> Self {
        ListenerEntry::Port(PortValue::Number(i64::from(port)))
    }
}

impl From<ListenerOptions> for ListenerEntry {
    fn from(options: ListenerOptions) -> Self {
        ListenerEntry::Options(Box::new(options))
    }
}

/// A port as it appears in configuration, before range checking.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Text(String),
}

impl PortValue {
    /// Parse into a TCP port, rejecting anything outside 0-65535.
    pub fn parse(&self) -> Option<u16> {
        match self {
            PortValue::Number(n) => u16::try_from(*n).ok(),
            PortValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortValue::Number(n) => write!(f, "{}", n),
            PortValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Listener table. TLS fields are ignored for plaintext listeners.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ListenerOptions {
    pub port: Option<PortValue>,
    pub host: Option<String>,

    /// Socket inactivity timeout in milliseconds.
    pub timeout: Option<u64>,

    /// Idle keep-alive timeout in milliseconds.
    pub keep_alive_timeout: Option<u64>,

    #[serde(skip)]
    pub handler: Option<Router>,

    /// Directory that relative credential paths are resolved against.
    pub root: Option<PathBuf>,
    pub key: Option<OneOrMany<Pem>>,
    pub cert: Option<CertInput>,
    pub ca: Option<OneOrMany<Pem>>,
    pub ciphers: Option<OneOrMany<String>>,
    pub honor_cipher_order: Option<bool>,

    /// Hostname pattern to credential overrides, in match order.
    pub sni: SniTable,

    /// Ask clients for a certificate, verified against `ca`.
    pub request_cert: bool,

    /// Reject clients whose certificate is missing or invalid when
    /// `request_cert` is set. Defaults to true.
    pub reject_unauthorized: Option<bool>,

    /// ALPN protocols to advertise instead of the class default.
    pub alpn: Option<Vec<String>>,
}

impl ListenerOptions {
    pub fn with_port(port: u16) -> Self {
        Self {
            port: Some(PortValue::Number(i64::from(port))),
            ..Self::default()
        }
    }
}

/// Per-hostname credential overrides. Unset fields fall back to the
/// listener's own values.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SniEntry {
    pub key: Option<OneOrMany<Pem>>,
    pub cert: Option<CertInput>,
    pub ca: Option<OneOrMany<Pem>>,
    pub ciphers: Option<OneOrMany<String>>,
    pub honor_cipher_order: Option<bool>,
}

/// Ordered hostname pattern table.
///
/// Lookups are first-match-wins, so the document order of the table is
/// kept rather than collected into a map.
#[derive(Debug, Clone, Default)]
pub struct SniTable(pub Vec<(String, SniEntry)>);

impl SniTable {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, SniEntry)> {
        self.0.iter()
    }

    /// Append a pattern after the existing ones.
    pub fn push(&mut self, pattern: impl Into<String>, entry: SniEntry) {
        self.0.push((pattern.into(), entry));
    }
}

impl<'de> Deserialize<'de> for SniTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = SniTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of hostname patterns")
            }

            fn visit_map<A>(self, mut map: A) -> Result<SniTable, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((pattern, entry)) = map.next_entry::<String, SniEntry>()? {
                    entries.push((pattern, entry));
                }
                Ok(SniTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
