//! tgrelay API Server
//!
//! Main entry point for the upload relay service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tgrelay_api::{AppState, create_router};
use tgrelay_core::deploy::{DeployConfig, DeployService};
use tgrelay_core::session::SessionStore;
use tgrelay_core::storage::{LocalStore, StorageConfig};
use tgrelay_shared::AppConfig;
use tgrelay_telegram::TelegramClient;

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tgrelay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Local storage for spools, retained uploads and session files
    let store = Arc::new(
        LocalStore::from_config(StorageConfig::from(&config.storage))
            .context("Failed to initialize local storage")?,
    );
    info!(
        root = %store.root().display(),
        max_file_size = config.storage.max_file_size,
        chunk_size = config.storage.chunk_size,
        "Local storage ready"
    );

    // Telegram client
    let client = Arc::new(
        TelegramClient::new(&config.telegram).context("Failed to build Telegram client")?,
    );
    info!(
        api = %config.telegram.api_base_url,
        max_retries = config.telegram.max_retries,
        "Telegram client configured"
    );

    let deploy_config = DeployConfig::from_telegram_config(&config.telegram)
        .context("Invalid Telegram defaults")?;
    if deploy_config.default_destination.is_none() {
        warn!("No default chat configured; requests must send group_id");
    }
    if deploy_config.default_credential.is_none() {
        warn!("No default bot token configured; requests must send bot_token");
    }

    let sessions = Arc::new(SessionStore::new(store.clone()));
    let deploy = Arc::new(DeployService::new(deploy_config, client, store, sessions));

    // Create router
    let app = create_router(AppState::new(deploy.clone()));

    // Start server
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    deploy.close().await;
    info!("Server stopped");

    Ok(())
}
