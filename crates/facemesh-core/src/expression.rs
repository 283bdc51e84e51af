//! Rule-based facial expression heuristic over mouth and brow geometry.
//!
//! Distances are in the provider's pixel space and are not normalized by face
//! size, so the default thresholds only hold for a face of roughly webcam
//! scale at arm's length.

use crate::topology::{
    LEFT_BROW, LEFT_EYE_UPPER_LID, LEFT_MOUTH_CORNER, LOWER_LIP_INNER, RIGHT_BROW,
    RIGHT_MOUTH_CORNER, UPPER_LIP_INNER,
};
use crate::types::{Mesh, MeshError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Indices the heuristic reads. A mesh missing any of them is rejected.
pub const REQUIRED_LANDMARKS: [usize; 7] = [
    LEFT_MOUTH_CORNER,
    RIGHT_MOUTH_CORNER,
    UPPER_LIP_INNER,
    LOWER_LIP_INNER,
    LEFT_BROW,
    RIGHT_BROW,
    LEFT_EYE_UPPER_LID,
];

/// Coarse facial expression label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Neutral,
    Smiling,
    Sad,
    Surprised,
}

impl Expression {
    pub fn label(self) -> &'static str {
        match self {
            Expression::Neutral => "Neutral",
            Expression::Smiling => "Smiling",
            Expression::Sad => "Sad",
            Expression::Surprised => "Surprised",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Expression::Neutral => "🙂",
            Expression::Smiling => "😀",
            Expression::Sad => "🙁",
            Expression::Surprised => "😮",
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

/// Geometric measurements taken from one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpressionFeatures {
    /// Distance between the mouth corners.
    pub mouth_width: f64,
    /// Vertical gap between the inner lips.
    pub mouth_height: f64,
    /// Distance between the brows. Reported only; no rule reads it.
    pub brow_distance: f64,
    /// Left upper eyelid y minus left brow y. Reported only; no rule reads it.
    pub brow_lift: f64,
}

impl ExpressionFeatures {
    pub fn from_mesh(mesh: &Mesh) -> Result<Self, MeshError> {
        mesh.require(&REQUIRED_LANDMARKS)?;

        let left_mouth = mesh.point(LEFT_MOUTH_CORNER)?;
        let right_mouth = mesh.point(RIGHT_MOUTH_CORNER)?;
        let top_lip = mesh.point(UPPER_LIP_INNER)?;
        let bottom_lip = mesh.point(LOWER_LIP_INNER)?;
        let left_brow = mesh.point(LEFT_BROW)?;
        let right_brow = mesh.point(RIGHT_BROW)?;
        let left_eye = mesh.point(LEFT_EYE_UPPER_LID)?;

        Ok(Self {
            mouth_width: left_mouth.distance_2d(&right_mouth),
            mouth_height: (top_lip.y - bottom_lip.y).abs(),
            brow_distance: left_brow.distance_2d(&right_brow),
            brow_lift: left_eye.y - left_brow.y,
        })
    }
}

/// Calibration constants for the decision table. All comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionThresholds {
    /// Surprised needs the lips parted by more than this...
    pub surprised_mouth_height: f64,
    /// ...and the mouth wider than this.
    pub surprised_mouth_width: f64,
    /// Smiling: mouth wider than this.
    pub smiling_mouth_width: f64,
    /// Sad: mouth narrower than this.
    pub sad_mouth_width: f64,
}

impl Default for ExpressionThresholds {
    fn default() -> Self {
        Self {
            surprised_mouth_height: 3.0,
            surprised_mouth_width: 40.0,
            smiling_mouth_width: 50.0,
            sad_mouth_width: 48.0,
        }
    }
}

impl ExpressionThresholds {
    /// Read thresholds from the `[expression]` table of a TOML document.
    ///
    /// Missing keys, or a missing table, keep their defaults.
    pub fn from_toml(src: &str) -> Result<Self, toml::de::Error> {
        #[derive(Deserialize)]
        struct ThresholdsFile {
            #[serde(default)]
            expression: ExpressionThresholds,
        }

        let file: ThresholdsFile = toml::from_str(src)?;
        Ok(file.expression)
    }

    /// Evaluate the decision table in order; the first matching rule wins.
    pub fn decide(&self, features: &ExpressionFeatures) -> Expression {
        let ExpressionFeatures {
            mouth_width,
            mouth_height,
            ..
        } = *features;

        if mouth_height > self.surprised_mouth_height && mouth_width > self.surprised_mouth_width {
            Expression::Surprised
        } else if mouth_width > self.smiling_mouth_width {
            Expression::Smiling
        } else if mouth_width < self.sad_mouth_width {
            Expression::Sad
        } else {
            Expression::Neutral
        }
    }
}

/// Strategy for labelling a mesh with an expression.
pub trait ExpressionClassifier {
    fn classify(&self, mesh: &Mesh) -> Result<Expression, MeshError>;
}

/// Threshold classifier over mouth geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeometricClassifier {
    pub thresholds: ExpressionThresholds,
}

impl GeometricClassifier {
    pub fn new(thresholds: ExpressionThresholds) -> Self {
        Self { thresholds }
    }
}

impl ExpressionClassifier for GeometricClassifier {
    fn classify(&self, mesh: &Mesh) -> Result<Expression, MeshError> {
        let features = ExpressionFeatures::from_mesh(mesh)?;
        Ok(self.thresholds.decide(&features))
    }
}

/// Classify with the default thresholds.
pub fn classify(mesh: &Mesh) -> Result<Expression, MeshError> {
    GeometricClassifier::default().classify(mesh)
}
