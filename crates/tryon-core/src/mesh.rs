//! Face-mesh landmark source via ONNX Runtime.
//!
//! Wraps a MediaPipe-style face-landmark model: one RGB frame in, 468
//! mesh landmarks plus a face-presence flag out. The model is an opaque
//! collaborator — nothing downstream depends on how the landmarks are
//! produced, only on the normalized coordinate contract of [`Landmark`].

use crate::types::Landmark;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const MESH_INPUT_SIZE: usize = 192;
const MESH_LANDMARK_COUNT: usize = 468;
/// Floats per landmark in the output tensor: x, y, z.
const MESH_COORDS_PER_LANDMARK: usize = 3;
/// Default sigmoid(face-flag) threshold below which a frame counts as
/// "no face".
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("model file not found: {0} — place face_landmark.onnx in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Face-mesh landmark session.
#[derive(Debug)]
pub struct FaceMesh {
    session: Session,
    output_count: usize,
    score_threshold: f32,
}

impl FaceMesh {
    /// Load the face-landmark ONNX model from the given path.
    ///
    /// Any failure here is a `ModelLoadFailure` from the controller's
    /// point of view: the caller surfaces a permanently not-ready state
    /// instead of crashing.
    pub fn load(model_path: &str, score_threshold: f32) -> Result<Self, MeshError> {
        if !Path::new(model_path).exists() {
            return Err(MeshError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_count = session.outputs().len();
        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
            score_threshold,
            "loaded face-mesh model"
        );

        if output_count < 2 {
            return Err(MeshError::InferenceFailed(format!(
                "face-mesh model needs landmark and face-flag outputs, got {output_count}"
            )));
        }

        Ok(Self {
            session,
            output_count,
            score_threshold,
        })
    }

    /// Run one frame through the mesh.
    ///
    /// `rgb` is tightly packed RGB24, `width * height * 3` bytes.
    /// Returns `Ok(None)` when no face is present — an expected transient
    /// condition, signaled through state rather than an error. A detected
    /// face yields 468 landmarks normalized to the *original* frame (the
    /// exact stretch-resize preserves normalized positions).
    pub fn landmarks(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<Vec<Landmark>>, MeshError> {
        let expected = (width * height * 3) as usize;
        if rgb.len() < expected {
            return Err(MeshError::InferenceFailed(format!(
                "RGB buffer too short: expected {expected}, got {}",
                rgb.len()
            )));
        }

        let input = preprocess_rgb(rgb, width as usize, height as usize);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // Output roles are discovered by tensor length rather than name:
        // exports of this model family disagree on names, but the landmark
        // tensor is always 468 × 3 floats and the face flag is a scalar.
        let mut coords: Option<&[f32]> = None;
        let mut flag: Option<f32> = None;
        for idx in 0..self.output_count {
            let (_, data) = outputs[idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| MeshError::InferenceFailed(format!("output {idx}: {e}")))?;
            match data.len() {
                1 => flag = Some(data[0]),
                n if n >= MESH_LANDMARK_COUNT * MESH_COORDS_PER_LANDMARK => {
                    coords = Some(data)
                }
                _ => {}
            }
        }

        let coords = coords.ok_or_else(|| {
            MeshError::InferenceFailed("no landmark tensor in model outputs".into())
        })?;
        let flag = flag.ok_or_else(|| {
            MeshError::InferenceFailed("no face-flag tensor in model outputs".into())
        })?;

        let score = sigmoid(flag);
        if score < self.score_threshold {
            tracing::debug!(score, "no face in frame");
            return Ok(None);
        }

        Ok(Some(parse_landmarks(coords)))
    }
}

/// Logistic sigmoid — the face flag is exported as a logit.
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Convert the raw coordinate tensor into normalized landmarks.
///
/// Coordinates arrive in input-tensor pixels (0..192); dividing by the
/// input size yields `[0, 1]` positions valid for the original frame.
fn parse_landmarks(coords: &[f32]) -> Vec<Landmark> {
    let inv = 1.0 / MESH_INPUT_SIZE as f32;
    (0..MESH_LANDMARK_COUNT)
        .map(|i| {
            let off = i * MESH_COORDS_PER_LANDMARK;
            Landmark::new(coords[off] * inv, coords[off + 1] * inv)
        })
        .collect()
}

/// Preprocess an RGB frame into a 1×192×192×3 NHWC float tensor in `[0, 1]`.
///
/// The frame is stretch-resized (no letterbox) with bilinear interpolation,
/// matching how the model was trained; this is what keeps the output
/// landmarks valid as normalized coordinates of the original frame.
fn preprocess_rgb(rgb: &[u8], width: usize, height: usize) -> Array4<f32> {
    let size = MESH_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));

    let scale_x = width as f32 / size as f32;
    let scale_y = height as f32 / size as f32;

    for y in 0..size {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..size {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for c in 0..3 {
                let tl = rgb[(y0 * width + x0) * 3 + c] as f32;
                let tr = rgb[(y0 * width + x1) * 3 + c] as f32;
                let bl = rgb[(y1 * width + x0) * 3 + c] as f32;
                let br = rgb[(y1 * width + x1) * 3 + c] as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                tensor[[0, y, x, c]] = val / 255.0;
            }
        }
    }

    tensor
}
