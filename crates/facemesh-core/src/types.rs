use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("invalid mesh: landmark {index} missing (mesh has {len} points)")]
    InvalidMesh { index: usize, len: usize },
}

/// A single landmark point. `z` is 0.0 for providers that only report 2-D points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "LandmarkRepr")]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub const fn with_depth(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Planar (x, y) Euclidean distance; depth is ignored.
    pub fn distance_2d(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Wire shapes a landmark arrives in: `[x, y, z]`, `[x, y]` or `{ "x", "y", "z"? }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum LandmarkRepr {
    Triple(f64, f64, f64),
    Pair(f64, f64),
    Object {
        x: f64,
        y: f64,
        #[serde(default)]
        z: f64,
    },
}

impl From<LandmarkRepr> for Landmark {
    fn from(repr: LandmarkRepr) -> Self {
        match repr {
            LandmarkRepr::Triple(x, y, z) => Self::with_depth(x, y, z),
            LandmarkRepr::Pair(x, y) => Self::new(x, y),
            LandmarkRepr::Object { x, y, z } => Self::with_depth(x, y, z),
        }
    }
}

/// Ordered landmark sequence in the face-mesh topology.
///
/// Indices are anatomical: the same index always names the same location.
/// Reads go through [`Mesh::point`], which fails with
/// [`MeshError::InvalidMesh`] instead of yielding a default coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mesh {
    points: Vec<Landmark>,
}

impl Mesh {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Landmark at a topology index.
    pub fn point(&self, index: usize) -> Result<Landmark, MeshError> {
        self.points.get(index).copied().ok_or(MeshError::InvalidMesh {
            index,
            len: self.points.len(),
        })
    }

    /// Fail with the first of `indices` the mesh does not contain.
    pub fn require(&self, indices: &[usize]) -> Result<(), MeshError> {
        match indices.iter().find(|&&i| i >= self.points.len()) {
            Some(&index) => Err(MeshError::InvalidMesh {
                index,
                len: self.points.len(),
            }),
            None => Ok(()),
        }
    }

    /// Parse a mesh from JSON.
    ///
    /// Accepts a bare landmark array, or an object carrying the array under
    /// `mesh` (ml5 predictions) or `keypoints` (tfjs face-landmarks-detection).
    pub fn from_json(src: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum MeshDocument {
            Bare(Vec<Landmark>),
            Ml5 { mesh: Vec<Landmark> },
            Tfjs { keypoints: Vec<Landmark> },
        }

        let points = match serde_json::from_str::<MeshDocument>(src)? {
            MeshDocument::Bare(points) => points,
            MeshDocument::Ml5 { mesh } => mesh,
            MeshDocument::Tfjs { keypoints } => keypoints,
        };
        Ok(Self::new(points))
    }
}

impl From<Vec<Landmark>> for Mesh {
    fn from(points: Vec<Landmark>) -> Self {
        Self::new(points)
    }
}

/// One detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub mesh: Mesh,
    /// Face-presence score reported by the provider, if any.
    pub confidence: Option<f32>,
}
