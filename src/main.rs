//! ws-console
//!
//! Opens a WebSocket connection to `ws://<host>/ws` and prints every received
//! message as a `Received: <payload>` line on stdout. The `serve` subcommand
//! runs the development server that hosts the page and its `/ws` endpoint.

mod client;
mod config;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use client::{Endpoint, Listener, ListenerError};
use config::{ConsoleConfig, CONFIG_FILE};
use server::{DevServer, ServerConfig};

/// Same-origin WebSocket console
#[derive(Parser, Debug)]
#[command(name = "ws-console")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to ws://<host>/ws and print received messages
    Listen {
        /// Host (hostname plus optional port) to connect to
        #[arg(long)]
        host: Option<String>,
    },

    /// Serve the page bundle and the /ws echo endpoint
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Directory to serve static assets from
        #[arg(long)]
        public: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout only carries received messages
    let log_level = if args.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    debug!("ws-console v{}", env!("CARGO_PKG_VERSION"));

    let config = ConsoleConfig::load(&args.config)?;

    match args.command {
        Command::Listen { host } => {
            let host = host.unwrap_or(config.listen.host);
            listen(&host).await
        }
        Command::Serve { port, bind, public } => {
            let server_config = ServerConfig::new(
                bind.unwrap_or_else(|| config.serve.bind.clone()),
                port.unwrap_or(config.serve.port),
                public.unwrap_or_else(|| config.serve.resolved_public_dir()),
            );
            serve(server_config).await
        }
    }
}

/// Run the console listener against `host` until the connection ends
async fn listen(host: &str) -> anyhow::Result<()> {
    let endpoint = Endpoint::from_host(host)?;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    let mut listener = Listener::new(endpoint, std::io::stdout());
    info!("Listening on {}", listener.endpoint());
    match listener.run(shutdown_rx).await {
        Ok(summary) => {
            debug!("Listener finished after {} messages", summary.messages);
            Ok(())
        }
        // Transport failures are not reported on the output stream
        Err(e @ (ListenerError::Connect { .. } | ListenerError::Read(_))) => {
            debug!("{}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Run the development server until a shutdown signal arrives
async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let server = Arc::new(DevServer::new(config));
    let server_handle = Arc::clone(&server);

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        server_handle.shutdown();
    });

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
