//! dx-relay: N3FJP to HamClock bridge
//!
//! Connects to the N3FJP logger's TCP API, decodes call tab events from the
//! `<CMD>...</CMD>` record stream, and relays the DX coordinates to one or
//! more HamClock instances via their `set_newdx` HTTP endpoint.

mod client;
mod config;
mod dispatch;
mod protocol;

use client::ApiClient;
use config::Config;
use dispatch::Dispatcher;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        targets = %config.targets,
        "Starting dx-relay"
    );

    let dispatcher = Dispatcher::new(&config.targets)?;
    let client = Arc::new(ApiClient::new(config.host.clone(), config.port, dispatcher));

    // Ctrl-C stops the read loop
    let shutdown = Arc::clone(&client);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.disconnect();
        }
    });

    client.connect().await?;
    Ok(())
}
