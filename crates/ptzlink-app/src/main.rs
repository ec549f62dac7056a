use std::path::PathBuf;

use anyhow::Result;
use ptzlink_core::config::DEFAULT_CONFIG_FILE;
use ptzlink_core::PtzConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod http;
mod mjpeg;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG=debug shows every VISCA datagram in hex
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(false)
        .init();

    info!("PtzLink v{}", env!("CARGO_PKG_VERSION"));

    let path = std::env::var("PTZLINK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = PtzConfig::load(&path)?;
    config.apply_env(|key| std::env::var(key).ok())?;

    match app::run(config).await {
        Ok(()) => {
            info!("PtzLink exited cleanly.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}
