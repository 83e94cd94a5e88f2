//! Analyzer doubles shared by engine and handler tests.

use gaze_core::{AnalyzerError, Embedding, FaceAnalyzer, FaceBox};
use image::RgbImage;

/// Fixed detections and a fixed embedding for every call.
pub(crate) struct StubAnalyzer {
    pub faces: Vec<FaceBox>,
    pub embedding: Vec<f32>,
}

impl StubAnalyzer {
    /// One face per image, with the given embedding.
    pub fn with_one_face(embedding: Vec<f32>) -> Self {
        Self {
            faces: vec![FaceBox {
                top: 1,
                right: 7,
                bottom: 7,
                left: 1,
                confidence: 0.9,
            }],
            embedding,
        }
    }

    /// Never detects anything.
    pub fn without_faces() -> Self {
        Self {
            faces: Vec::new(),
            embedding: Vec::new(),
        }
    }
}

impl FaceAnalyzer for StubAnalyzer {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<FaceBox>, AnalyzerError> {
        Ok(self.faces.clone())
    }

    fn embed(&mut self, _image: &RgbImage, _face: &FaceBox) -> Result<Embedding, AnalyzerError> {
        Ok(Embedding::new(self.embedding.clone()))
    }
}
