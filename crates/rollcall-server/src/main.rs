//! `rollcall` binary: runs the attendance HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_server::{AppState, Cli, create_app};
use rollcall_storage::{Database, DatabaseConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Cli::parse().into_config().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let clock = config.clock()?;
    info!(
        version = rollcall_core::VERSION,
        timezone = %config.timezone,
        database = %config.database_path,
        "starting rollcall"
    );

    let db = Database::new(DatabaseConfig::new(config.database_path.clone()))
        .await
        .context("failed to open database")?;

    let listen_addr = config.listen_addr;
    let state = AppState::new(db.clone(), Arc::new(clock), config);
    let device = state
        .seed_default_device()
        .await
        .context("failed to seed default device")?;
    info!(device_id = %device.device_id, mode = %device.mode, "default device ready");

    let app = create_app(state);
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
