use std::sync::Arc;

use anyhow::Context;

use emogo::api;
use emogo::config::{ServerConfig, StorageConfig};
use emogo::store::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server_config = ServerConfig::from_env().context("Invalid server configuration")?;

    eprintln!("EmoGo backend v{}", env!("CARGO_PKG_VERSION"));

    // ── Storage ──────────────────────────────────────────────────────────
    let storage = Arc::new(Storage::new(StorageConfig::from_env()));
    let backend = storage.resolve_backend().await;
    eprintln!("   Storage: {}", backend.kind());

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = api::router(Arc::clone(&storage));
    let addr = server_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    eprintln!("   API: http://{addr}/");
    eprintln!("   Dashboard: http://{addr}/dashboard\n");
    tracing::info!(addr = %addr, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    storage.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
