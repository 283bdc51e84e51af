//! Tracking session: last-seen faces and the user-captured mesh.

use crate::expression::{Expression, ExpressionClassifier, ExpressionFeatures};
use crate::types::{Face, Mesh, MeshError};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of one face's mesh taken by an explicit capture action.
///
/// Immutable once taken; the next capture replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedMesh {
    mesh: Mesh,
    captured_at: DateTime<Utc>,
}

impl CapturedMesh {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            captured_at: Utc::now(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// Expression derived from the current capture, with the measurements behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ExpressionReport {
    pub expression: Expression,
    pub label: String,
    pub features: ExpressionFeatures,
    pub captured_at: DateTime<Utc>,
    pub landmarks: usize,
}

/// Owns the faces from the most recent frame and the captured mesh.
#[derive(Debug, Default)]
pub struct Session {
    faces: Vec<Face>,
    captured: Option<CapturedMesh>,
    captures_taken: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the last-seen faces with this frame's result (possibly empty).
    pub fn update_faces(&mut self, faces: Vec<Face>) {
        self.faces = faces;
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// The face every consumer acts on: the first one the provider returned.
    pub fn primary_face(&self) -> Option<&Face> {
        self.faces.first()
    }

    /// Snapshot the primary face's mesh.
    ///
    /// Returns `false` and leaves any earlier capture untouched when no face
    /// is currently detected.
    pub fn capture(&mut self) -> bool {
        let Some(face) = self.primary_face() else {
            tracing::debug!("capture ignored: no face detected");
            return false;
        };

        let mesh = face.mesh.clone();
        let landmarks = mesh.len();
        self.captured = Some(CapturedMesh::new(mesh));
        self.captures_taken += 1;
        tracing::info!(
            landmarks,
            captures = self.captures_taken,
            "captured face mesh"
        );
        true
    }

    pub fn captured(&self) -> Option<&CapturedMesh> {
        self.captured.as_ref()
    }

    pub fn captures_taken(&self) -> u64 {
        self.captures_taken
    }

    /// Classify the captured mesh, if there is one.
    pub fn expression<C: ExpressionClassifier + ?Sized>(
        &self,
        classifier: &C,
    ) -> Result<Option<Expression>, MeshError> {
        self.captured
            .as_ref()
            .map(|c| classifier.classify(c.mesh()))
            .transpose()
    }

    /// Classify the captured mesh and attach the geometric features.
    pub fn report<C: ExpressionClassifier + ?Sized>(
        &self,
        classifier: &C,
    ) -> Result<Option<ExpressionReport>, MeshError> {
        let Some(captured) = &self.captured else {
            return Ok(None);
        };

        let expression = classifier.classify(captured.mesh())?;
        let features = ExpressionFeatures::from_mesh(captured.mesh())?;

        Ok(Some(ExpressionReport {
            expression,
            label: expression.to_string(),
            features,
            captured_at: captured.captured_at(),
            landmarks: captured.mesh().len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::GeometricClassifier;
    use crate::topology::{LEFT_MOUTH_CORNER, MESH_POINT_COUNT, RIGHT_MOUTH_CORNER};
    use crate::types::Landmark;

    fn face_with_mouth_width(width: f64) -> Face {
        let mut points = vec![Landmark::new(0.0, 0.0); MESH_POINT_COUNT];
        points[LEFT_MOUTH_CORNER] = Landmark::new(100.0, 100.0);
        points[RIGHT_MOUTH_CORNER] = Landmark::new(100.0 + width, 100.0);
        Face {
            mesh: Mesh::new(points),
            confidence: Some(0.9),
        }
    }

    #[test]
    fn test_capture_without_face_is_noop() {
        let mut session = Session::new();
        assert!(!session.capture());
        assert!(session.captured().is_none());
        assert_eq!(session.captures_taken(), 0);
    }

    #[test]
    fn test_capture_without_face_keeps_previous() {
        let mut session = Session::new();
        session.update_faces(vec![face_with_mouth_width(55.0)]);
        assert!(session.capture());
        let before = session.captured().cloned().unwrap();

        session.update_faces(Vec::new());
        assert!(!session.capture());
        assert_eq!(session.captured(), Some(&before));
        assert_eq!(session.captures_taken(), 1);
    }

    #[test]
    fn test_capture_is_a_deep_copy() {
        let mut session = Session::new();
        session.update_faces(vec![face_with_mouth_width(55.0)]);
        session.capture();

        // A new frame does not alter the snapshot.
        session.update_faces(vec![face_with_mouth_width(20.0)]);
        let classifier = GeometricClassifier::default();
        assert_eq!(session.expression(&classifier).unwrap(), Some(Expression::Smiling));
    }

    #[test]
    fn test_capture_uses_first_face() {
        let mut session = Session::new();
        session.update_faces(vec![face_with_mouth_width(20.0), face_with_mouth_width(55.0)]);
        session.capture();
        let classifier = GeometricClassifier::default();
        assert_eq!(session.expression(&classifier).unwrap(), Some(Expression::Sad));
    }

    #[test]
    fn test_recapture_replaces() {
        let mut session = Session::new();
        let classifier = GeometricClassifier::default();

        session.update_faces(vec![face_with_mouth_width(55.0)]);
        session.capture();
        session.update_faces(vec![face_with_mouth_width(49.0)]);
        session.capture();

        assert_eq!(session.expression(&classifier).unwrap(), Some(Expression::Neutral));
        assert_eq!(session.captures_taken(), 2);
    }

    #[test]
    fn test_expression_without_capture() {
        let session = Session::new();
        let classifier = GeometricClassifier::default();
        assert_eq!(session.expression(&classifier).unwrap(), None);
        assert!(session.report(&classifier).unwrap().is_none());
    }

    #[test]
    fn test_invalid_capture_surfaces_error() {
        let mut session = Session::new();
        session.update_faces(vec![Face {
            mesh: Mesh::new(vec![Landmark::new(0.0, 0.0); 10]),
            confidence: None,
        }]);
        assert!(session.capture());
        let classifier = GeometricClassifier::default();
        assert_eq!(
            session.expression(&classifier),
            Err(MeshError::InvalidMesh { index: 61, len: 10 })
        );
    }

    #[test]
    fn test_report_contents() {
        let mut session = Session::new();
        session.update_faces(vec![face_with_mouth_width(55.0)]);
        session.capture();

        let report = session
            .report(&GeometricClassifier::default())
            .unwrap()
            .unwrap();
        assert_eq!(report.expression, Expression::Smiling);
        assert_eq!(report.label, "😀 Smiling");
        assert_eq!(report.landmarks, MESH_POINT_COUNT);
        assert!((report.features.mouth_width - 55.0).abs() < 1e-4);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["expression"], "smiling");
    }
}
