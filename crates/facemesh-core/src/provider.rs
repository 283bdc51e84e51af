use crate::types::Face;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("model file not found: {0} — export a face-mesh landmark model to ONNX and place it in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer has {actual} bytes, expected {expected} for RGB {width}x{height}")]
    InvalidFrame {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Source of per-frame face meshes.
///
/// An empty result means no face is in view; it is not an error.
pub trait LandmarkProvider {
    /// Estimate faces in a packed RGB8 frame.
    fn estimate_faces(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Face>, ProviderError>;
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn estimate_faces(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Face>, ProviderError> {
        (**self).estimate_faces(rgb, width, height)
    }
}

/// Check that a buffer holds exactly one RGB8 frame of the given size.
pub fn check_rgb_frame(rgb: &[u8], width: u32, height: u32) -> Result<(), ProviderError> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        return Err(ProviderError::InvalidFrame {
            expected,
            actual: rgb.len(),
            width,
            height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_rgb_frame() {
        assert!(check_rgb_frame(&[0u8; 12], 2, 2).is_ok());
        let err = check_rgb_frame(&[0u8; 11], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidFrame { expected: 12, actual: 11, .. }
        ));
    }
}
