//! UltraFace face detector via ONNX Runtime.
//!
//! Runs the version-RFB-320 model: fixed 320x240 RGB input, two outputs
//! (`scores` [1,N,2] and `boxes` [1,N,4] with normalized corner
//! coordinates), followed by confidence filtering and NMS.

use crate::types::FaceBox;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const ULTRAFACE_INPUT_WIDTH: usize = 320;
const ULTRAFACE_INPUT_HEIGHT: usize = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_NMS_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} (download version-RFB-320.onnx from the Ultra-Light-Fast-Generic-Face-Detector release and place it in the model dir)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// UltraFace-based face detector.
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded UltraFace model"
        );

        Ok(Self { session })
    }

    /// Detect faces in an RGB image.
    ///
    /// Returns boxes in the original image's pixel space, sorted by
    /// confidence descending.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, DetectorError> {
        let input = Self::preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let detections = decode_detections(
            scores,
            boxes,
            image.width(),
            image.height(),
            ULTRAFACE_CONFIDENCE_THRESHOLD,
        );

        let mut result = nms(detections, ULTRAFACE_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }

    /// Preprocess an RGB image into the fixed-size NCHW float tensor the
    /// model expects.
    fn preprocess(image: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(
            image,
            ULTRAFACE_INPUT_WIDTH as u32,
            ULTRAFACE_INPUT_HEIGHT as u32,
            image::imageops::FilterType::Triangle,
        );

        let mut tensor =
            Array4::<f32>::zeros((1, 3, ULTRAFACE_INPUT_HEIGHT, ULTRAFACE_INPUT_WIDTH));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
            }
        }

        tensor
    }
}

/// Decode raw model outputs into pixel-space face boxes.
///
/// `scores` holds [background, face] pairs per anchor; `boxes` holds
/// normalized [x1, y1, x2, y2] corners. Degenerate boxes are dropped.
fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    image_width: u32,
    image_height: u32,
    threshold: f32,
) -> Vec<FaceBox> {
    let num_anchors = scores.len() / 2;
    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let score = scores[idx * 2 + 1];
        if score <= threshold {
            continue;
        }

        let off = idx * 4;
        if off + 3 >= boxes.len() {
            break;
        }

        let x1 = boxes[off].clamp(0.0, 1.0) * image_width as f32;
        let y1 = boxes[off + 1].clamp(0.0, 1.0) * image_height as f32;
        let x2 = boxes[off + 2].clamp(0.0, 1.0) * image_width as f32;
        let y2 = boxes[off + 3].clamp(0.0, 1.0) * image_height as f32;

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        detections.push(FaceBox {
            top: y1 as u32,
            right: x2 as u32,
            bottom: y2 as u32,
            left: x1 as u32,
            confidence: score,
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection-over-Union between two face boxes.
fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let left = a.left.max(b.left) as f32;
    let top = a.top.max(b.top) as f32;
    let right = a.right.min(b.right) as f32;
    let bottom = a.bottom.min(b.bottom) as f32;

    let inter_w = (right - left).max(0.0);
    let inter_h = (bottom - top).max(0.0);
    let inter_area = inter_w * inter_h;

    let area_a = (a.width() * a.height()) as f32;
    let area_b = (b.width() * b.height()) as f32;
    let union_area = area_a + area_b - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}
