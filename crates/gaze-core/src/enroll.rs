//! Registration aggregation: turn a batch of sample images into one
//! identity's raw embeddings and thumbnail.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::types::{Embedding, FaceBox};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("no face detected in any sample image")]
    NoFaceDetected,
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// Aggregated output of one registration.
#[derive(Debug)]
pub struct Enrollment {
    /// One embedding per sample image that yielded a detection, in input
    /// order. Non-empty.
    pub samples: Vec<Embedding>,
    /// Base64 JPEG crop from the first image with a successful detection.
    pub thumbnail: Option<String>,
}

/// Process registration sample images.
///
/// At most `max_samples` images are considered. Images without a detected
/// face are skipped; for the rest, only the first detected face is embedded.
/// Errors with [`EnrollError::NoFaceDetected`] when nothing was usable.
pub fn collect_enrollment(
    analyzer: &mut dyn FaceAnalyzer,
    images: &[RgbImage],
    max_samples: usize,
    thumbnail_size: u32,
) -> Result<Enrollment, EnrollError> {
    let mut samples = Vec::new();
    let mut thumbnail = None;

    for image in images.iter().take(max_samples) {
        let faces = analyzer.detect(image)?;
        let Some(face) = faces.first() else {
            continue;
        };

        // Only the first detected face per sample image is used.
        let embedding = analyzer.embed(image, face)?;
        samples.push(embedding);

        if thumbnail.is_none() {
            thumbnail = make_thumbnail(image, face, thumbnail_size);
        }
    }

    if samples.is_empty() {
        return Err(EnrollError::NoFaceDetected);
    }

    tracing::debug!(
        samples = samples.len(),
        has_thumbnail = thumbnail.is_some(),
        "enrollment samples collected"
    );

    Ok(Enrollment { samples, thumbnail })
}

/// Crop the face box, resize to a square thumbnail, JPEG-encode, base64.
///
/// Failure is non-fatal: a record without a thumbnail is still valid.
fn make_thumbnail(image: &RgbImage, face: &FaceBox, size: u32) -> Option<String> {
    if face.width() == 0 || face.height() == 0 {
        return None;
    }

    let left = face.left.min(image.width());
    let top = face.top.min(image.height());
    let width = face.width().min(image.width().saturating_sub(left));
    let height = face.height().min(image.height().saturating_sub(top));
    if width == 0 || height == 0 {
        return None;
    }

    let crop = image::imageops::crop_imm(image, left, top, width, height).to_image();
    let thumb =
        image::imageops::resize(&crop, size, size, image::imageops::FilterType::Triangle);

    let mut jpeg = Vec::new();
    if let Err(err) = thumb.write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
    {
        tracing::warn!(error = %err, "thumbnail encoding failed");
        return None;
    }

    Some(BASE64.encode(jpeg))
}
