//! roster-dash - founder roster service
//!
//! Zero-config startup: every setting has a compiled default, the config file
//! is optional, and command-line flags (or their environment variables) win
//! over the file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use roster_common::config::{
    load_module_config, RootFolderInitializer, RootFolderResolver, CONFIG_PATH_ENV,
    ROOT_FOLDER_ENV,
};
use roster_common::store::FileStore;
use roster_common::RosterContext;
use roster_dash::sources::{CsvSnapshot, HttpLiveFeed, LiveFeed, NoLiveFeed};
use roster_dash::{build_router, AppState, MODULE_NAME};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for roster-dash
#[derive(Parser, Debug)]
#[command(name = "roster-dash")]
#[command(about = "Founder roster service")]
#[command(version)]
struct Args {
    /// Root folder for persisted overrides
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "ROSTER_PORT")]
    port: Option<u16>,

    /// Base URL of the live event feed
    #[arg(long, env = "ROSTER_LIVE_FEED_URL")]
    live_feed_url: Option<String>,

    /// CSV snapshot used when the live feed is unavailable
    #[arg(long, env = "ROSTER_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Serve the snapshot only; never contact the live feed
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_module_config(MODULE_NAME, args.config.as_deref());

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("roster_dash={0},roster_common={0},tower_http=info", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting roster-dash v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Command line beats the config file
    if let Some(url) = args.live_feed_url {
        config.live_feed_url = Some(url);
    }
    if let Some(path) = args.snapshot {
        config.snapshot_path = Some(path);
    }
    if args.demo {
        config.demo_mode = true;
    }

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .with_config_root(config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let store = FileStore::open(initializer.overrides_dir())
        .context("Failed to open override store")?;

    let ctx = RosterContext::from_config(&config);
    let timeout = Duration::from_millis(config.request_timeout_ms_or_default());
    let feed: Arc<dyn LiveFeed> = match config.live_feed_url.as_deref() {
        Some(url) if !ctx.is_demo() => {
            info!("Live feed: {}", url);
            Arc::new(HttpLiveFeed::new(url, timeout).context("Failed to set up live feed")?)
        }
        _ => {
            if !ctx.is_demo() {
                warn!("No live feed configured; serving snapshot only");
            }
            Arc::new(NoLiveFeed)
        }
    };
    match &config.snapshot_path {
        Some(path) => info!("Snapshot: {}", path.display()),
        None => warn!("No snapshot configured"),
    }
    let snapshot = Arc::new(CsvSnapshot::new(config.snapshot_path.clone()));

    info!(mode = ?ctx.mode, "Roster context ready");
    let state = AppState::new(ctx, Box::new(store), feed, snapshot);
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port.unwrap_or(config.port_or_default())));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("roster-dash listening on http://{}", addr);
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
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
