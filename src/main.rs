//! Room gateway
//!
//! Front door for the collaborative-room backend, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//! Client request
//!     → http server (buffer body, per-request context)
//!     → error boundary (500 + one error report on failure)
//!     → route table: preflight → origin guard → room routes → not found
//!     → room backend
//!     → CORS reconciler (headers added, set-cookie values restored)
//! Client response
//!
//! Cross-cutting: config (TOML + env, hot reload), logging, metrics,
//! error reporting, deferred work drained on shutdown
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use room_gateway::config::watcher::ConfigWatcher;
use room_gateway::config::{load_config, load_from_env, GatewayConfig};
use room_gateway::lifecycle::signals::shutdown_signal;
use room_gateway::observability::{logging, metrics};
use room_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "room-gateway")]
#[command(about = "Front-door dispatcher for the collaborative-room backend", long_about = None)]
struct Cli {
    /// TOML config file. Without one, defaults plus IS_LOCAL / SENTRY_DSN are used.
    #[arg(short, long, env = "ROOM_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config: GatewayConfig = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    if cli.check {
        println!("Configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "room-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend_url = %config.rooms.backend_url,
        is_local = config.environment.is_local,
        reporting = config.environment.sentry_dsn.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Hot reload only applies when there is a file to watch.
    let (config_updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    (mpsc::unbounded_channel().1, None)
                }
            }
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::from_config(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
