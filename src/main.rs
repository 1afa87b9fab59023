//! calltrack server
//!
//! Serves the three tracker tables over REST, persists them in sled and
//! broadcasts table changes to websocket clients.

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info};

use calltrack::api::{router, AppState};
use calltrack::config::ServerConfig;
use calltrack::records::TableKind;
use calltrack::storage::TableStore;
use calltrack::sync::PROTOCOL_VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "calltrack=info,calltrack_server=info,tower_http=info".into()
            }),
        )
        .init();

    let config = ServerConfig::from_env();

    info!("Initializing storage at: {}", config.storage.path);
    let store = TableStore::open(config.storage.clone()).context("Failed to open storage")?;
    let state = Arc::new(AppState::new(store.clone()));

    let app = router(state, &config);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("calltrack server v{} starting", env!("CARGO_PKG_VERSION"));
    info!("   Protocol version: {}", PROTOCOL_VERSION);
    info!("   Listening on: http://{}", addr);
    info!("   WebSocket: ws://{}/ws", addr);
    for table in TableKind::ALL {
        info!(
            "   {}: GET {} / POST {}",
            table,
            table.list_path(),
            table.save_path()
        );
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = store.flush() {
        error!("Failed to flush storage on shutdown: {}", e);
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
