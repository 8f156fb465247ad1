//! refdir-notify - partner notification microservice
//!
//! Fans out new orders and questions to matching partners on Telegram,
//! keeps partner cards on the broadcast channel in sync, and receives the
//! bot's webhook updates.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use refdir_common::config::{default_database_path, load_toml_config};
use refdir_common::events::EventBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refdir_notify::config::{resolve_notify_config, resolve_telegram_settings};
use refdir_notify::platform::TelegramClient;
use refdir_notify::AppState;

const CONFIG_FILE_NAME: &str = "refdir-notify.toml";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5810;

/// Command-line arguments for refdir-notify
#[derive(Parser, Debug)]
#[command(name = "refdir-notify")]
#[command(about = "Partner notification microservice for the referral directory")]
#[command(version)]
struct Args {
    /// Bootstrap TOML config file
    #[arg(short, long, env = "REFDIR_NOTIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "REFDIR_NOTIFY_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides the config file)
    #[arg(short, long, env = "REFDIR_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml_config, config_source) = load_toml_config(args.config.as_deref(), CONFIG_FILE_NAME)
        .context("Failed to load bootstrap config")?;

    // Initialize tracing; RUST_LOG wins over the config file level
    let default_filter = format!(
        "refdir_notify={},refdir_common={},tower_http=info",
        toml_config.logging.level, toml_config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting refdir-notify v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_source {
        info!("Config file: {}", path.display());
    }

    let db_path = args
        .database
        .or_else(|| toml_config.database_path.clone())
        .unwrap_or_else(default_database_path);
    info!("Database: {}", db_path.display());

    let db_pool = refdir_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let notify_config = resolve_notify_config(&db_pool, &toml_config)
        .await
        .context("Failed to resolve runtime configuration")?;
    let telegram_settings =
        resolve_telegram_settings(&toml_config).context("Failed to resolve Telegram settings")?;
    let platform = Arc::new(
        TelegramClient::new(&telegram_settings).context("Failed to build Telegram client")?,
    );
    info!(
        discussion_chat_id = %notify_config.discussion_chat_id,
        channel_id = %notify_config.channel.chat_id,
        "Telegram client ready"
    );

    let event_bus = EventBus::new(100);
    let state = AppState::new(db_pool, event_bus, platform, notify_config);
    let app = refdir_notify::build_router(state);

    let host = toml_config.host.as_deref().unwrap_or(DEFAULT_HOST);
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

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

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
