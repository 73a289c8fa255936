//! ptm-media - pull-test media service
//!
//! Imports and reconciles test media in managed storage, estimates camera
//! offsets and plans composite exports. HTTP REST + SSE.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ptm_common::config::{resolve_root_folder, RootFolder, TomlConfig, ROOT_FOLDER_ENV};
use ptm_common::events::EventBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ptm_media::AppState;

const DEFAULT_PORT: u16 = 5780;
const DEFAULT_BIND: &str = "127.0.0.1";
const EVENT_BUS_CAPACITY: usize = 256;

/// Command-line arguments for ptm-media
#[derive(Parser, Debug)]
#[command(name = "ptm-media")]
#[command(about = "Pull-test media service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and managed media
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PTM_MEDIA_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "PTM_MEDIA_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_or_default();

    let default_filter = format!(
        "ptm_media={level},ptm_common={level},tower_http=info",
        level = toml_config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting ptm-media v{} ({}, {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    let root = RootFolder::new(resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        &toml_config,
    ));
    root.ensure_exists()
        .with_context(|| format!("Failed to initialize root folder {}", root.path().display()))?;
    info!("Root folder: {}", root.path().display());

    let db_path = root.database_path();
    let db = ptm_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let state = AppState::new(db, event_bus, root);
    let app = ptm_media::build_router(state);

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let bind = args
        .bind
        .or(toml_config.bind_address)
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
