//! ArcFace-style face embedder via ONNX Runtime.
//!
//! Extracts 512-dimensional embeddings from face crops. The crop is taken
//! straight from the detector's box (plus a small margin) without landmark
//! alignment, since the embedder contract is `embed(image, box)`.

use crate::types::{Embedding, FaceBox};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (different normalization from UltraFace!) ---
const EMBED_INPUT_SIZE: u32 = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 127.5; // symmetric normalization, not 128.0
const EMBEDDING_DIM: usize = 512;
/// Fraction of the box size added on each side before cropping.
const CROP_MARGIN: f32 = 0.1;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0} (download w600k_r50.onnx from insightface and place it in the model dir)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face box produced an empty crop")]
    EmptyCrop,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based face embedder.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the embedding ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding model"
        );

        Ok(Self { session })
    }

    /// Extract an L2-normalized embedding for one detected face.
    pub fn extract(
        &mut self,
        image: &RgbImage,
        face: &FaceBox,
    ) -> Result<Embedding, EmbedderError> {
        let crop = crop_face(image, face, CROP_MARGIN).ok_or(EmbedderError::EmptyCrop)?;
        let input = Self::preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();
        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(l2_normalize(raw)))
    }

    /// Preprocess a 112x112 RGB face crop into a NCHW float tensor.
    fn preprocess(crop: &RgbImage) -> Array4<f32> {
        let size = EMBED_INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in crop.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - EMBED_MEAN) / EMBED_STD;
            }
        }

        tensor
    }
}

/// Crop the face box (plus margin), clamped to image bounds, resized to the
/// embedder input size. `None` for degenerate boxes.
fn crop_face(image: &RgbImage, face: &FaceBox, margin: f32) -> Option<RgbImage> {
    if face.width() == 0 || face.height() == 0 {
        return None;
    }

    let margin_w = (face.width() as f32 * margin) as u32;
    let margin_h = (face.height() as f32 * margin) as u32;

    let left = face.left.saturating_sub(margin_w).min(image.width());
    let top = face.top.saturating_sub(margin_h).min(image.height());
    let right = face.right.saturating_add(margin_w).min(image.width());
    let bottom = face.bottom.saturating_add(margin_h).min(image.height());

    if right <= left || bottom <= top {
        return None;
    }

    let cropped =
        image::imageops::crop_imm(image, left, top, right - left, bottom - top).to_image();
    Some(image::imageops::resize(
        &cropped,
        EMBED_INPUT_SIZE,
        EMBED_INPUT_SIZE,
        image::imageops::FilterType::Triangle,
    ))
}

/// Scale a vector to unit L2 norm. Zero vectors pass through unchanged.
fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}
