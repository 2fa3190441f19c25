//! multiserve
//!
//! Brings up every listener described in a TOML file and serves a fixed
//! body on all of them until SIGINT/SIGTERM.
//!
//! ```text
//! multiserve --config servers.toml --body "hello"
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::any, Router};
use clap::Parser;

use multiserve::lifecycle::shutdown_signal;
use multiserve::observability::{logging, metrics};
use multiserve::{create_servers, load_config};

#[derive(Parser, Debug)]
#[command(name = "multiserve", version, about = "Start HTTP, HTTPS and HTTP/2 listeners from one config file")]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "multiserve.toml")]
    config: PathBuf,

    /// Log level for multiserve and tower_http (overridden by RUST_LOG).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Seconds open connections may take to finish on shutdown.
    #[arg(long, default_value_t = 30)]
    grace_secs: u64,

    /// Response body for every request.
    #[arg(long, default_value = "ok")]
    body: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref(), cli.json_logs)?;

    tracing::info!("multiserve v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr);
    }

    let grace = Some(Duration::from_secs(cli.grace_secs));
    let config = load_config(&cli.config)?.with_handler(static_body(cli.body));

    let servers = match create_servers(config).await {
        Ok(servers) => servers,
        Err(error) => {
            tracing::error!(error = %error, "Startup failed");
            let message = error.to_string();
            error.into_servers().shutdown(grace).await;
            return Err(message.into());
        }
    };

    for listener in servers.iter() {
        tracing::info!(
            class = %listener.class(),
            address = %listener.local_addr(),
            "Listening for connections"
        );
    }

    shutdown_signal().await;

    let errors = servers.shutdown(grace).await;
    if !errors.is_empty() {
        return Err(format!("{} listener(s) did not shut down cleanly", errors.len()).into());
    }
    Ok(())
}

fn static_body(body: String) -> Router {
    Router::new()
        .route("/{*path}", any(respond))
        .route("/", any(respond))
        .with_state(Arc::<str>::from(body))
}

async fn respond(State(body): State<Arc<str>>) -> String {
    body.to_string()
}
