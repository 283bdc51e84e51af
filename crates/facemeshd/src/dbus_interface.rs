use crate::engine::{EngineError, EngineHandle};
use std::path::PathBuf;
use zbus::interface;

pub const BUS_NAME: &str = "io.facemesh.Tracker1";
pub const OBJECT_PATH: &str = "/io/facemesh/Tracker1";

/// D-Bus interface for the facemesh tracking daemon.
///
/// Bus name: io.facemesh.Tracker1 (session bus)
/// Object path: /io/facemesh/Tracker1
pub struct TrackerService {
    engine: EngineHandle,
}

impl TrackerService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

#[interface(name = "io.facemesh.Tracker1")]
impl TrackerService {
    /// Capture the first face in view. Returns false when no face is detected.
    async fn capture(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("capture requested");
        self.engine.capture().await.map_err(to_fdo)
    }

    /// Expression of the captured mesh as JSON, or `null` before any capture.
    async fn expression(&self) -> zbus::fdo::Result<String> {
        let report = self.engine.expression().await.map_err(to_fdo)?;
        serde_json::to_string(&report).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(to_fdo)?;
        serde_json::to_string(&status).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Write the current overlay canvas to a PNG file.
    async fn snapshot(&self, path: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(path, "snapshot requested");
        self.engine
            .snapshot(PathBuf::from(path))
            .await
            .map(|()| true)
            .map_err(to_fdo)
    }
}

fn to_fdo(err: EngineError) -> zbus::fdo::Error {
    match err {
        EngineError::InvalidMesh(e) => zbus::fdo::Error::InvalidArgs(e.to_string()),
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}
