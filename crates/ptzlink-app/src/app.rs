use std::sync::Arc;

use anyhow::{Context, Result};
use ptzlink_control::CameraController;
use ptzlink_core::PtzConfig;
use ptzlink_relay::{blank_jpeg, source_from_config, RelayOptions, VideoRelay};
use ptzlink_transport::{SessionManager, UdpViscaLink};
use tracing::{info, warn};

use crate::http::{self, AppState};

/// Wire everything together and serve until Ctrl-C.
///
/// # Flow
/// 1. Open the UDP link to the camera and start the session worker
/// 2. Start the video relay pull loop (independent of control)
/// 3. Serve the HTTP routes
/// 4. On shutdown: stop the motors, stop the relay, close the session
pub async fn run(config: PtzConfig) -> Result<()> {
    // ── Control path ──────────────────────────────────────────────────────
    let link = UdpViscaLink::connect(&config.camera.socket_addr(), config.camera.framing)
        .await
        .context("Opening VISCA link")?;
    let session = Arc::new(SessionManager::spawn(Arc::new(link), &config.control));
    let controller = Arc::new(CameraController::new(Arc::clone(&session), &config.camera));

    // ── Video path ────────────────────────────────────────────────────────
    let source = source_from_config(&config.video).context("Creating video source")?;
    let relay = Arc::new(VideoRelay::new(source, RelayOptions::from(&config.video)));
    relay.start();

    let placeholder = blank_jpeg(config.video.width, config.video.height, config.video.jpeg_quality)
        .context("Encoding placeholder frame")?;

    // ── HTTP ──────────────────────────────────────────────────────────────
    let state = AppState::new(Arc::clone(&controller), Arc::clone(&relay), placeholder);
    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("Binding HTTP listener on {}", config.http.bind))?;
    info!("Camera {} | stream {}", config.camera.socket_addr(), config.video.source_url);
    info!("Open http://{} in a browser.", listener.local_addr()?);

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server")?;

    // ── Shutdown ──────────────────────────────────────────────────────────
    if let Err(e) = controller.stop().await {
        warn!("Final stop not confirmed: {}", e);
    }
    relay.stop().await;
    session.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
