//! Face-mesh landmark model via ONNX Runtime.
//!
//! Runs the 468-point MediaPipe face landmark network on a letterboxed
//! 192×192 view of the whole frame and maps the points back to frame pixels.
//! At most one face is reported per frame.
//!
//! There is no face detection stage in front of the network, so the frame is
//! never cropped to the face. The network expects a face filling most of its
//! input; a small or off-center face gives unreliable landmarks.

use crate::provider::{check_rgb_frame, LandmarkProvider, ProviderError};
use crate::topology::MESH_POINT_COUNT;
use crate::types::{Face, Landmark, Mesh};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::str::FromStr;

const FACEMESH_INPUT_SIZE: u32 = 192;
const FACEMESH_LANDMARK_VALUES: usize = MESH_POINT_COUNT * 3;
const FACEMESH_MIN_FACE_CONFIDENCE: f32 = 0.5;

/// Memory layout of the model's image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputLayout {
    /// `[1, 192, 192, 3]`, as exported straight from the TFLite graph.
    #[default]
    Nhwc,
    /// `[1, 3, 192, 192]`.
    Nchw,
}

impl FromStr for InputLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(InputLayout::Nhwc),
            "nchw" => Ok(InputLayout::Nchw),
            other => Err(format!("unknown input layout {other:?} (expected nhwc or nchw)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkerOptions {
    /// Faces scoring below this are dropped.
    pub min_face_confidence: f32,
    /// Mirror returned x coordinates to match a mirrored preview.
    pub flip_horizontal: bool,
    pub layout: InputLayout,
}

impl Default for LandmarkerOptions {
    fn default() -> Self {
        Self {
            min_face_confidence: FACEMESH_MIN_FACE_CONFIDENCE,
            flip_horizontal: false,
            layout: InputLayout::default(),
        }
    }
}

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Face-mesh landmark provider backed by an ONNX session.
pub struct FaceMeshLandmarker {
    session: Session,
    options: LandmarkerOptions,
    output_count: usize,
}

impl FaceMeshLandmarker {
    /// Load the face-mesh ONNX model from the given path.
    pub fn load(model_path: &str, options: LandmarkerOptions) -> Result<Self, ProviderError> {
        if !Path::new(model_path).exists() {
            return Err(ProviderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let output_count = session.outputs().len();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            layout = ?options.layout,
            "loaded face mesh model"
        );

        if output_count == 0 {
            return Err(ProviderError::InferenceFailed(
                "face mesh model has no outputs".to_string(),
            ));
        }

        Ok(Self {
            session,
            options,
            output_count,
        })
    }

    pub fn options(&self) -> &LandmarkerOptions {
        &self.options
    }
}

impl LandmarkProvider for FaceMeshLandmarker {
    fn estimate_faces(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Face>, ProviderError> {
        check_rgb_frame(rgb, width, height)?;
        let (input, letterbox) = preprocess(rgb, width, height, self.options.layout)?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // Output names differ between exports, so tensors are told apart by
        // size: 468×3 landmark values and a single face-presence logit.
        let mut landmarks: Option<Vec<f32>> = None;
        let mut logit: Option<f32> = None;
        for idx in 0..self.output_count {
            let Ok((_, data)) = outputs[idx].try_extract_tensor::<f32>() else {
                tracing::trace!(output = idx, "skipping non-f32 output");
                continue;
            };
            match data.len() {
                FACEMESH_LANDMARK_VALUES if landmarks.is_none() => landmarks = Some(data.to_vec()),
                1 if logit.is_none() => logit = Some(data[0]),
                _ => {}
            }
        }

        let landmarks = landmarks.ok_or_else(|| {
            ProviderError::InferenceFailed(format!(
                "no output with {FACEMESH_LANDMARK_VALUES} landmark values"
            ))
        })?;

        let confidence = logit.map(face_presence);
        if let Some(score) = confidence {
            if score < self.options.min_face_confidence {
                tracing::trace!(score, "face presence below threshold");
                return Ok(Vec::new());
            }
        }

        let mesh = decode_landmarks(&landmarks, &letterbox, width, self.options.flip_horizontal);
        Ok(vec![Face { mesh, confidence }])
    }
}

/// Letterbox a packed RGB frame into the model's input tensor, scaled to [0, 1].
///
/// Padding is left at 0.0 (black).
fn preprocess(
    rgb: &[u8],
    width: u32,
    height: u32,
    layout: InputLayout,
) -> Result<(Array4<f32>, Letterbox), ProviderError> {
    let invalid = || ProviderError::InvalidFrame {
        expected: width as usize * height as usize * 3,
        actual: rgb.len(),
        width,
        height,
    };
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    let frame = RgbImage::from_raw(width, height, rgb.to_vec()).ok_or_else(invalid)?;

    let size = FACEMESH_INPUT_SIZE as f32;
    let scale = (size / width as f32).min(size / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, FACEMESH_INPUT_SIZE);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, FACEMESH_INPUT_SIZE);
    let pad_x = (FACEMESH_INPUT_SIZE - new_w) / 2;
    let pad_y = (FACEMESH_INPUT_SIZE - new_h) / 2;

    let resized = image::imageops::resize(&frame, new_w, new_h, FilterType::Triangle);

    let n = FACEMESH_INPUT_SIZE as usize;
    let mut tensor = match layout {
        InputLayout::Nhwc => Array4::<f32>::zeros((1, n, n, 3)),
        InputLayout::Nchw => Array4::<f32>::zeros((1, 3, n, n)),
    };

    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + pad_x) as usize;
        let ty = (y + pad_y) as usize;
        for (c, &value) in pixel.0.iter().enumerate() {
            let normalized = value as f32 / 255.0;
            match layout {
                InputLayout::Nhwc => tensor[[0, ty, tx, c]] = normalized,
                InputLayout::Nchw => tensor[[0, c, ty, tx]] = normalized,
            }
        }
    }

    Ok((
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    ))
}

/// Map model-space landmarks back to frame pixels.
fn decode_landmarks(raw: &[f32], letterbox: &Letterbox, frame_width: u32, flip: bool) -> Mesh {
    raw.chunks_exact(3)
        .take(MESH_POINT_COUNT)
        .map(|p| {
            let scale = f64::from(letterbox.scale);
            let x = (f64::from(p[0]) - f64::from(letterbox.pad_x)) / scale;
            let y = (f64::from(p[1]) - f64::from(letterbox.pad_y)) / scale;
            let z = f64::from(p[2]) / scale;
            let x = if flip { f64::from(frame_width) - x } else { x };
            Landmark::with_depth(x, y, z)
        })
        .collect::<Vec<_>>()
        .into()
}

/// Sigmoid of the face-flag logit.
fn face_presence(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}
