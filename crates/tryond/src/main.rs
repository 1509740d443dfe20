use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod assets;
mod capture;
mod config;
mod dbus_interface;
mod engine;
mod gallery;

use capture::CaptureController;
use dbus_interface::TryonService;
use gallery::Gallery;

const BUS_NAME: &str = "dev.tryon.TryOn1";
const OBJECT_PATH: &str = "/dev/tryon/TryOn1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("tryond starting");

    let config = config::Config::from_env();
    let overlay_assets = assets::discover(&config.asset_dir).with_context(|| {
        format!(
            "failed to read overlay assets from {}",
            config.asset_dir.display()
        )
    })?;
    if overlay_assets.is_empty() {
        tracing::warn!(dir = %config.asset_dir.display(), "no overlay assets — captures will fail");
    }

    // Startup failure of camera or model is surfaced through the state
    // channel, not a crash: the daemon stays up reporting loaded=false.
    let (engine, state) = engine::spawn_engine(
        config.camera_device.clone(),
        config.mesh_model_path(),
        config.score_threshold,
    );

    let gallery = Gallery::new();
    let controller = Arc::new(CaptureController::new(
        engine,
        overlay_assets,
        Duration::from_millis(config.decode_timeout_ms),
        gallery.clone(),
    ));

    let service = TryonService {
        controller,
        state,
        gallery,
    };

    let _conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on the session bus")?;

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "tryond ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("tryond shutting down");

    Ok(())
}
