//! facemesh-core — Face landmark meshes and the expression heuristic.
//!
//! Holds the typed 468-point mesh, the threshold classifier that labels a
//! captured mesh, the tracking session, the ONNX face-mesh provider and the
//! overlay renderer.

pub mod expression;
pub mod landmarker;
pub mod overlay;
pub mod provider;
pub mod session;
pub mod topology;
pub mod types;

pub use expression::{
    classify, Expression, ExpressionClassifier, ExpressionFeatures, ExpressionThresholds,
    GeometricClassifier,
};
pub use landmarker::{FaceMeshLandmarker, InputLayout, LandmarkerOptions};
pub use overlay::{OverlayError, OverlayStyle};
pub use provider::{LandmarkProvider, ProviderError};
pub use session::{CapturedMesh, ExpressionReport, Session};
pub use types::{Face, Landmark, Mesh, MeshError};

/// Default directory for model files: `$XDG_DATA_HOME/facemesh/models`.
pub fn default_model_dir() -> std::path::PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            std::path::PathBuf::from(home).join(".local/share")
        })
        .join("facemesh/models")
}
