//! Resumable big-file upload server entry point.

mod config;

use std::sync::Arc;

use bigfile_server::AppState;
use bigfile_store::{BigFileStore, StoreOptions};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::config::{ServerConfig, config_path};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bigfile=debug")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting bigfile server");

    let config = ServerConfig::load(&config_path())?;
    let store = BigFileStore::open(
        &config.storage_root,
        StoreOptions {
            remove_chunks_after_merge: config.remove_chunks_after_merge,
        },
    )
    .await?;

    let app = bigfile_server::router(AppState::new(Arc::new(store)), config.max_chunk_bytes);
    let listener = TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(
        listen_address = %listener.local_addr()?,
        storage_root = %config.storage_root.display(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
