//! Task tracker server binary.
//!
//! Loads configuration, starts logging and metrics, assembles the stores and
//! services, then serves HTTP until a shutdown signal arrives.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use task_tracker::config::load_config;
use task_tracker::http::HttpServer;
use task_tracker::lifecycle::{build_state, signals, Shutdown};
use task_tracker::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "task-tracker")]
#[command(about = "Task tracking API with JWT authentication and distributed rate limiting")]
struct Args {
    /// Path to a TOML config file. Environment variables override its values.
    #[arg(short, long, env = "TASK_TRACKER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "task-tracker starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = ?config.store.backend,
        rate_limit = config.rate_limit.enabled,
        revocation = config.revocation.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let bind_address = config.listener.bind_address.clone();
    let state = build_state(config).await?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(state);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
