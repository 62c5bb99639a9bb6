//! falcon-serve - HTTP API for Falcon Messenger
//!
//! Serves `/health`, `/config` and `/publish` on top of the dispatch engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libfalcon::logging::LoggingConfig;
use libfalcon::server::{self, AppState};
use libfalcon::{Config, Dispatcher};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "falcon-serve")]
#[command(version, about = "Run the Falcon Messenger HTTP API")]
#[command(long_about = "\
falcon-serve - Run the Falcon Messenger HTTP API

ENDPOINTS:
    GET  /health   Service status and configured targets
    GET  /config   Which publishers are configured
    POST /publish  Publish {\"message\", \"targets\", \"image_url\", \"image_data\", \"metadata\"}

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (in-flight requests finish)

CONFIGURATION:
    Configuration file: ~/.config/falcon-messenger/config.toml
    Overrides: FALCON_HOST, FALCON_PORT, FALCON_DEBUG and the publisher variables
")]
struct Cli {
    /// Address to bind (overrides config)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    LoggingConfig::from_env(cli.verbose || config.server.debug).init();

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let dispatcher = Dispatcher::from_config(&config).context("Failed to build publishers")?;
    if dispatcher.registry().is_empty() {
        warn!("No publishers configured; /publish will reject every request");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    server::serve(listener, AppState::new(Arc::new(dispatcher)), shutdown_signal())
        .await
        .context("Server error")?;

    info!("falcon-serve stopped");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM
#[cfg(unix)]
async fn shutdown_signal() {
    use futures::stream::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            if let Some(signal) = signals.next().await {
                info!("Received signal {}, shutting down gracefully...", signal);
            }
        }
        Err(e) => {
            warn!("Signal setup failed ({}), falling back to Ctrl-C", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl-C, shutting down gracefully...");
}
