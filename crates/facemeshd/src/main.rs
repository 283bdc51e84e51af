use anyhow::{Context, Result};
use facemesh_core::{FaceMeshLandmarker, GeometricClassifier};
use facemesh_hw::Camera;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::Config;
use dbus_interface::{TrackerService, BUS_NAME, OBJECT_PATH};
use engine::{EngineError, EngineOptions};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facemeshd starting");

    let config = Config::from_env();
    let thresholds = config.thresholds().context("loading expression thresholds")?;
    tracing::info!(?thresholds, "expression thresholds");

    let camera = Camera::open(&config.camera_device)?.with_mirror(config.flip_horizontal);

    let model_path = config.model_path();
    let landmarker = FaceMeshLandmarker::load(&model_path, config.landmarker_options())
        .map_err(EngineError::ProviderUnavailable)
        .with_context(|| format!("loading face mesh model from {model_path}"))?;
    tracing::info!(model = %model_path, options = ?landmarker.options(), "face mesh model loaded");

    let engine = engine::spawn_engine(
        camera,
        landmarker,
        GeometricClassifier::new(thresholds),
        EngineOptions {
            frame_interval: config.frame_interval(),
            warmup_frames: config.warmup_frames,
            ..Default::default()
        },
    )?;

    let _connection = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, TrackerService::new(engine.clone()))?
        .build()
        .await?;

    tracing::info!(bus_name = BUS_NAME, path = OBJECT_PATH, "facemeshd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facemeshd shutting down");
    engine.shutdown().await?;

    Ok(())
}
