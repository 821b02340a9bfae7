//! spotscrape - album scanner and playlist builder
//!
//! `spotscrape serve` (default) runs the HTTP service; `spotscrape watch`
//! follows the progress of a running server from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spotscrape::services::progress_poller::{ProgressPoller, WatchOutput, DEFAULT_POLL_INTERVAL};
use spotscrape::utils::RetryPolicy;
use spotscrape::{build_router, AppState, Capabilities};
use spotscrape_common::config::{load_config, SpotScrapeConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Scan web pages for albums and turn them into Spotify playlists")]
struct Args {
    /// Configuration file (TOML); SPOTSCRAPE_CONFIG when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Address to bind
        #[arg(long, env = "SPOTSCRAPE_HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "SPOTSCRAPE_PORT")]
        port: Option<u16>,
    },
    /// Print progress of a running server until the session settles
    Watch {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:5723")]
        server: String,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
        interval_ms: u64,
    },
}

fn init_tracing(config: &SpotScrapeConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting spotscrape"
    );

    match args.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Watch { server, interval_ms } => watch(&config, &server, interval_ms).await,
    }
}

async fn serve(mut config: SpotScrapeConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let capabilities = Capabilities::from_config(&config).context("Failed to initialize service adapters")?;
    let state = AppState::new(config, capabilities);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn watch(config: &SpotScrapeConfig, server: &str, interval_ms: u64) -> Result<()> {
    let policy = RetryPolicy::from_config(&config.retry);
    let poller = ProgressPoller::new(server, policy, Duration::from_millis(interval_ms))?;

    let cancel = CancellationToken::new();
    let (mut reports, handle) = poller.spawn(cancel.clone());

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut output = WatchOutput::new();
    while let Some(report) = reports.recv().await {
        for line in output.render(&report) {
            println!("{}", line);
        }
    }

    handle.await.context("Progress poller task panicked")??;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
