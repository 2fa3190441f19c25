//! Startup orchestration.
//!
//! # Responsibilities
//! - Normalize the configuration into per-class listener plans
//! - Build secure contexts, bind and start every listener concurrently
//! - Aggregate successes and failures into one outcome
//!
//! # Design Decisions
//! - Every listener of every class runs as its own future in one join;
//!   nothing is reported until all have settled
//! - One failing listener never stops its siblings; successful listeners
//!   are always handed back so the caller can close them
//! - Output shape mirrors input shape: a class written as an array yields
//!   an array of listeners and an array of errors

use std::fmt;

use axum_server::Handle;
use futures_util::future::join_all;
use thiserror::Error;

use crate::config::normalize::{normalize, ClassPlan, ListenerSpec, Shape, Shaped};
use crate::config::{ConfigError, ProtocolClass, ServersConfig};
use crate::http::{server, Transport};
use crate::net::{self, ListenError, ListenerHandle};
use crate::observability::metrics;
use crate::tls::{context, SniAcceptor, SniDispatch};

/// Every listener that came up, grouped by class.
///
/// A class is `Some` only if it was requested and, for single-value
/// classes, succeeded.
#[derive(Debug, Default)]
pub struct Servers {
    pub http: Option<Shaped<ListenerHandle>>,
    pub https: Option<Shaped<ListenerHandle>>,
    pub http2: Option<Shaped<ListenerHandle>>,
}

impl Servers {
    pub fn get(&self, class: ProtocolClass) -> Option<&Shaped<ListenerHandle>> {
        match class {
            ProtocolClass::Http => self.http.as_ref(),
            ProtocolClass::Https => self.https.as_ref(),
            ProtocolClass::Http2 => self.http2.as_ref(),
        }
    }

    fn slot(&mut self, class: ProtocolClass) -> &mut Option<Shaped<ListenerHandle>> {
        match class {
            ProtocolClass::Http => &mut self.http,
            ProtocolClass::Https => &mut self.https,
            ProtocolClass::Http2 => &mut self.http2,
        }
    }

    /// All listener handles, class by class in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &ListenerHandle> {
        ProtocolClass::ALL
            .into_iter()
            .filter_map(move |class| self.get(class))
            .flat_map(|shaped| shaped.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every handle out, leaving the classes empty.
    pub fn into_handles(self) -> Vec<ListenerHandle> {
        [self.http, self.https, self.http2]
            .into_iter()
            .flatten()
            .flat_map(Shaped::into_vec)
            .collect()
    }
}

/// Partial or total failure to bring up the requested listeners.
#[derive(Debug, Default)]
pub struct ListenFailure {
    pub message: String,
    /// Listeners that did start; the caller is responsible for them.
    pub servers: Servers,
    pub http: Option<Shaped<ListenError>>,
    pub https: Option<Shaped<ListenError>>,
    pub http2: Option<Shaped<ListenError>>,
}

impl ListenFailure {
    pub fn errors(&self, class: ProtocolClass) -> Option<&Shaped<ListenError>> {
        match class {
            ProtocolClass::Http => self.http.as_ref(),
            ProtocolClass::Https => self.https.as_ref(),
            ProtocolClass::Http2 => self.http2.as_ref(),
        }
    }

    fn slot(&mut self, class: ProtocolClass) -> &mut Option<Shaped<ListenError>> {
        match class {
            ProtocolClass::Http => &mut self.http,
            ProtocolClass::Https => &mut self.https,
            ProtocolClass::Http2 => &mut self.http2,
        }
    }

    /// Classes that had at least one failure.
    pub fn failed_classes(&self) -> Vec<ProtocolClass> {
        ProtocolClass::ALL
            .into_iter()
            .filter(|&class| self.errors(class).is_some())
            .collect()
    }

    /// Every error, class by class.
    pub fn iter_errors(&self) -> impl Iterator<Item = (ProtocolClass, &ListenError)> {
        ProtocolClass::ALL.into_iter().flat_map(move |class| {
            self.errors(class)
                .into_iter()
                .flat_map(move |shaped| shaped.iter().map(move |e| (class, e)))
        })
    }
}

impl fmt::Display for ListenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for (class, error) in self.iter_errors() {
            write!(f, "; {}: {}", class, error)?;
        }
        Ok(())
    }
}

/// Error returned by `create_servers`.
#[derive(Debug, Error)]
pub enum CreateServersError {
    /// Nothing could be attempted.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Some listeners failed; the rest are inside.
    #[error("{0}")]
    Listen(Box<ListenFailure>),
}

impl CreateServersError {
    /// Listeners that started despite the error.
    pub fn into_servers(self) -> Servers {
        match self {
            CreateServersError::Config(_) => Servers::default(),
            CreateServersError::Listen(failure) => failure.servers,
        }
    }
}

/// Bring up every listener in `config` and wait until all have settled.
///
/// Returns `Ok` only when every requested listener is serving.
pub async fn create_servers(config: ServersConfig) -> Result<Servers, CreateServersError> {
    let plan = normalize(&config)?;

    tracing::info!(
        listeners = plan.len(),
        classes = plan.classes.len(),
        "Starting listeners"
    );

    let outcomes = join_all(plan.classes.into_iter().map(start_class)).await;
    aggregate(outcomes)
}

/// Callback form of `create_servers`: `callback(error, servers)`.
///
/// `servers` always holds whatever did start, also when `error` is set.
pub async fn create_servers_with<F, R>(config: ServersConfig, callback: F) -> R
where
    F: FnOnce(Option<CreateServersError>, Servers) -> R,
{
    match create_servers(config).await {
        Ok(servers) => callback(None, servers),
        Err(CreateServersError::Listen(mut failure)) => {
            let servers = std::mem::take(&mut failure.servers);
            callback(Some(CreateServersError::Listen(failure)), servers)
        }
        Err(error) => callback(Some(error), Servers::default()),
    }
}

/// Start one listener: secure context first, then bind, then serve.
pub async fn start_listener(spec: ListenerSpec) -> Result<ListenerHandle, ListenError> {
    let transport = match &spec.tls {
        None => Transport::Plain,
        Some(tls) if tls.has_sni() => Transport::Sni(SniAcceptor::new(SniDispatch::build(tls).await?)),
        Some(tls) => Transport::Tls(context::build(&tls.root, &tls.defaults).await?),
    };

    let (listener, local_addr) = net::bind(spec.host.as_deref(), spec.port).await?;

    let handle = Handle::new();
    let transport_name = transport.name();
    let task = server::spawn(listener, transport, &spec, handle.clone());

    tracing::info!(
        class = %spec.class,
        address = %local_addr,
        transport = transport_name,
        "Listener started"
    );
    metrics::record_listener_started(spec.class);

    Ok(ListenerHandle::new(spec.class, local_addr, handle, task))
}

struct ClassOutcome {
    class: ProtocolClass,
    shape: Shape,
    results: Vec<Result<ListenerHandle, ListenError>>,
}

async fn start_class(plan: ClassPlan) -> ClassOutcome {
    let ClassPlan {
        class,
        shape,
        listeners,
    } = plan;

    let results = join_all(listeners.into_iter().map(|spec| async move {
        let result = match spec {
            Ok(spec) => start_listener(spec).await,
            Err(e) => Err(ListenError::Config(e)),
        };
        if let Err(e) = &result {
            tracing::error!(class = %class, error = %e, "Listener failed to start");
            metrics::record_listener_failed(class, e.stage());
        }
        result
    }))
    .await;

    ClassOutcome {
        class,
        shape,
        results,
    }
}

fn aggregate(outcomes: Vec<ClassOutcome>) -> Result<Servers, CreateServersError> {
    let mut failure = ListenFailure::default();
    let mut failed = 0usize;

    for outcome in outcomes {
        let (started, errors): (Vec<_>, Vec<_>) = outcome.results.into_iter().partition(Result::is_ok);
        let started: Vec<ListenerHandle> = started.into_iter().filter_map(Result::ok).collect();
        let errors: Vec<ListenError> = errors.into_iter().filter_map(Result::err).collect();

        failed += errors.len();
        *failure.servers.slot(outcome.class) = Shaped::collect(outcome.shape, started);
        if !errors.is_empty() {
            *failure.slot(outcome.class) = Shaped::collect(outcome.shape, errors);
        }
    }

    if failed == 0 {
        tracing::info!(listeners = failure.servers.len(), "All listeners started");
        return Ok(failure.servers);
    }

    let classes: Vec<&str> = failure.failed_classes().iter().map(ProtocolClass::as_str).collect();
    failure.message = format!(
        "{} listener(s) failed to start ({})",
        failed,
        classes.join(", ")
    );
    tracing::warn!(
        failed,
        started = failure.servers.len(),
        "Some listeners failed to start"
    );

    Err(CreateServersError::Listen(Box::new(failure)))
}
