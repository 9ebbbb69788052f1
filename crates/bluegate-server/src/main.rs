//! # bluegate-server
//!
//! HTTP server exposing a local BlueZ adapter.
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package bluegate-server
//!
//! # Production
//! BLUEGATE_CONFIG=/etc/bluegate/config.toml ./bluegate-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bluegate_core::{prepare_adapter, BluetoothService, Config};
use bluegate_server::api::create_router;
use bluegate_server::logging;
use bluegate_server::state::AppState;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), adapter = %config.adapter.name, "Starting bluegate-server");

    let bluetooth = connect_backend(&config).await?;
    prepare_adapter(bluetooth.adapter(), &config.adapter)
        .await
        .context("Failed to prepare the Bluetooth adapter")?;

    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .context("Invalid server.bind_address")?;
    let app = create_router(AppState::new(bluetooth));

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(feature = "bluetooth")]
async fn connect_backend(config: &Config) -> anyhow::Result<BluetoothService> {
    let backend = bluegate_core::BluezBackend::connect(&config.adapter.name)
        .await
        .context("Failed to connect to BlueZ")?;
    Ok(BluetoothService::new(
        Arc::new(backend),
        config.scan.discovery_window(),
    ))
}

#[cfg(not(feature = "bluetooth"))]
async fn connect_backend(config: &Config) -> anyhow::Result<BluetoothService> {
    warn!("Built without the bluetooth feature; serving an empty in-memory adapter");
    let backend = bluegate_core::MockBackend::new(&config.adapter.name);
    Ok(BluetoothService::new(
        Arc::new(backend),
        config.scan.discovery_window(),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
