//! The seam between orchestration and inference.

use crate::detector::{DetectorError, FaceDetector};
use crate::embedder::{EmbedderError, FaceEmbedder};
use crate::types::{Embedding, FaceBox};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder: {0}")]
    Embedder(#[from] EmbedderError),
}

/// Face detection and embedding, consumed as opaque functions.
///
/// The daemon drives the ONNX implementation; tests drive in-memory doubles.
pub trait FaceAnalyzer {
    /// Detect faces in an image, ordered by detector confidence.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, AnalyzerError>;

    /// Extract an embedding for one detected face.
    fn embed(&mut self, image: &RgbImage, face: &FaceBox) -> Result<Embedding, AnalyzerError>;
}

/// ONNX-backed analyzer: UltraFace detection plus ArcFace embedding.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl OnnxAnalyzer {
    /// Load both models. Fails fast if either file is missing.
    pub fn load(detector_path: &str, embedder_path: &str) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(detector_path)?;
        let embedder = FaceEmbedder::load(embedder_path)?;
        Ok(Self { detector, embedder })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, AnalyzerError> {
        Ok(self.detector.detect(image)?)
    }

    fn embed(&mut self, image: &RgbImage, face: &FaceBox) -> Result<Embedding, AnalyzerError> {
        Ok(self.embedder.extract(image, face)?)
    }
}
