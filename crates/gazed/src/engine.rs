//! Inference engine: a dedicated OS thread owning the face analyzer.
//!
//! HTTP handlers talk to the thread through a clone-safe [`EngineHandle`]
//! over an mpsc channel with oneshot replies, so the (non-`Sync`) ONNX
//! sessions never cross threads.

use gaze_core::{collect_enrollment, AnalyzerError, EnrollError, Enrollment};
use gaze_core::{Embedding, FaceAnalyzer, FaceBox};
use image::RgbImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("no face detected in any sample image")]
    NoFaceDetected,
    #[error("engine thread exited")]
    ChannelClosed,
}

impl From<EnrollError> for EngineError {
    fn from(err: EnrollError) -> Self {
        match err {
            EnrollError::NoFaceDetected => EngineError::NoFaceDetected,
            EnrollError::Analyzer(e) => EngineError::Analyzer(e),
        }
    }
}

/// Limits applied to each enrollment run.
#[derive(Clone, Copy)]
pub struct EnrollLimits {
    pub max_samples: usize,
    pub thumbnail_size: u32,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Enroll {
        images: Vec<RgbImage>,
        reply: oneshot::Sender<Result<Enrollment, EngineError>>,
    },
    Scan {
        image: RgbImage,
        reply: oneshot::Sender<Result<Vec<(FaceBox, Embedding)>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run the registration aggregator over decoded sample images.
    pub async fn enroll(&self, images: Vec<RgbImage>) -> Result<Enrollment, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll {
                images,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Detect every face in an image and embed each one.
    pub async fn scan(&self, image: RgbImage) -> Result<Vec<(FaceBox, Embedding)>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Scan {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the inference loop on a dedicated OS thread owning the analyzer.
///
/// Generic over [`FaceAnalyzer`] so tests can drive the engine with
/// in-memory doubles instead of ONNX sessions.
pub fn spawn_engine<A>(mut analyzer: A, limits: EnrollLimits) -> EngineHandle
where
    A: FaceAnalyzer + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("gaze-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll { images, reply } => {
                        let result = collect_enrollment(
                            &mut analyzer,
                            &images,
                            limits.max_samples,
                            limits.thumbnail_size,
                        )
                        .map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Scan { image, reply } => {
                        let _ = reply.send(run_scan(&mut analyzer, &image));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

/// Detect all faces and embed each, preserving detector output order.
fn run_scan(
    analyzer: &mut dyn FaceAnalyzer,
    image: &RgbImage,
) -> Result<Vec<(FaceBox, Embedding)>, EngineError> {
    let faces = analyzer.detect(image)?;
    let mut results = Vec::with_capacity(faces.len());
    for face in faces {
        let embedding = analyzer.embed(image, &face)?;
        results.push((face, embedding));
    }
    Ok(results)
}
