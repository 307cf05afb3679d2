//! docdesk-server - Document storage backend for a browser document editor
//!
//! Stores uploaded office documents, produces signed editor configurations
//! for the external Document Server and writes back edited revisions it
//! reports through save callbacks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docdesk_common::config::{load_settings, resolve_config_path};
use docdesk_server::cache::spawn_sweeper;
use docdesk_server::{build_router, AppState};

/// Command-line arguments for docdesk-server
#[derive(Parser, Debug)]
#[command(name = "docdesk-server")]
#[command(about = "Document storage and editor configuration backend")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "DOCDESK_PORT")]
    port: Option<u16>,

    /// Directory for uploaded documents (overrides config file)
    #[arg(short, long, env = "DOCDESK_UPLOADS_DIR")]
    uploads_dir: Option<PathBuf>,

    /// Document Server base URL (overrides config file)
    #[arg(long, env = "DOCDESK_DOCUMENT_SERVER_URL")]
    document_server_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut settings = load_settings(config_path.as_deref()).context("Failed to load configuration")?;

    // Command-line arguments override the config file
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(dir) = args.uploads_dir {
        settings.uploads_dir = dir;
    }
    if let Some(url) = args.document_server_url {
        settings.document_server.url = url;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "docdesk_server={level},docdesk_common={level},tower_http={level}",
                    level = settings.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting docdesk-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("Configuration file: none (built-in defaults)"),
    }

    let state = AppState::new(settings.clone()).context("Failed to create Document Server client")?;
    state
        .store
        .ensure_dir()
        .await
        .with_context(|| format!("Failed to create uploads directory {}", settings.uploads_dir.display()))?;

    let sweeper = spawn_sweeper(
        state.configs.clone(),
        state.limiter.clone(),
        Duration::from_millis(settings.limits.sweep_interval_ms),
    );

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", settings.host, settings.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server running on http://{}", addr);
    info!("Document Server URL: {}", settings.document_server_url());
    info!("Uploads directory: {}", settings.uploads_dir.display());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
