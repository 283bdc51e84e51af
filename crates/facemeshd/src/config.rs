use facemesh_core::{ExpressionThresholds, InputLayout, LandmarkerOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid thresholds file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the face-mesh ONNX model.
    pub model_dir: PathBuf,
    /// Model file name inside `model_dir`.
    pub model_file: String,
    /// Input tensor layout of the model.
    pub model_layout: InputLayout,
    /// Target time between engine ticks.
    pub frame_interval_ms: u64,
    /// Minimum face-presence score for a face to be reported.
    pub min_face_confidence: f32,
    /// Mirror the camera image and landmarks, like a selfie preview.
    pub flip_horizontal: bool,
    /// Number of warmup frames to discard at startup (camera AE stabilization).
    pub warmup_frames: usize,
    /// Optional TOML file overriding the expression thresholds.
    pub thresholds_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `FACEMESH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACEMESH_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facemesh_core::default_model_dir());

        let model_layout = match std::env::var("FACEMESH_MODEL_LAYOUT") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring FACEMESH_MODEL_LAYOUT");
                InputLayout::default()
            }),
            Err(_) => InputLayout::default(),
        };

        Self {
            camera_device: std::env::var("FACEMESH_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            model_file: std::env::var("FACEMESH_MODEL_FILE")
                .unwrap_or_else(|_| "face_landmark.onnx".to_string()),
            model_layout,
            frame_interval_ms: env_u64("FACEMESH_FRAME_INTERVAL_MS", 33),
            min_face_confidence: env_f32("FACEMESH_MIN_FACE_CONFIDENCE", 0.5),
            flip_horizontal: std::env::var("FACEMESH_FLIP_HORIZONTAL")
                .map(|v| v != "0")
                .unwrap_or(true),
            warmup_frames: env_usize("FACEMESH_WARMUP_FRAMES", 4),
            thresholds_file: std::env::var("FACEMESH_THRESHOLDS_FILE")
                .ok()
                .map(PathBuf::from),
        }
    }

    /// Path to the face-mesh landmark model.
    pub fn model_path(&self) -> String {
        self.model_dir
            .join(&self.model_file)
            .to_string_lossy()
            .into_owned()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Provider options. The camera already mirrors the image when
    /// `flip_horizontal` is set, so landmarks come back mirrored with it.
    pub fn landmarker_options(&self) -> LandmarkerOptions {
        LandmarkerOptions {
            min_face_confidence: self.min_face_confidence,
            flip_horizontal: false,
            layout: self.model_layout,
        }
    }

    /// Expression thresholds: defaults, overridden by the thresholds file if set.
    pub fn thresholds(&self) -> Result<ExpressionThresholds, ConfigError> {
        match &self.thresholds_file {
            Some(path) => load_thresholds(path),
            None => Ok(ExpressionThresholds::default()),
        }
    }
}

fn load_thresholds(path: &Path) -> Result<ExpressionThresholds, ConfigError> {
    let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_thresholds(&src)
}

fn parse_thresholds(src: &str) -> Result<ExpressionThresholds, ConfigError> {
    Ok(ExpressionThresholds::from_toml(src)?)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
