use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bounding box for a detected face, in original-image pixel coordinates.
///
/// Edges follow the wire contract: top/right/bottom/left offsets from the
/// image origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Face embedding vector (512-dimensional for the bundled ArcFace model).
///
/// Embeddings are L2-normalized at extraction time, so Euclidean distance
/// between any two of them falls in [0, 2].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance to another embedding. Lower = more similar.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Element-wise arithmetic mean of a set of embeddings.
    ///
    /// Returns `None` for an empty slice. All inputs are expected to share
    /// one dimension; extra trailing components of longer vectors are ignored.
    pub fn mean(samples: &[Embedding]) -> Option<Embedding> {
        let first = samples.first()?;
        let dim = first.len();
        let mut acc = vec![0.0f64; dim];
        for sample in samples {
            for (slot, v) in acc.iter_mut().zip(sample.values.iter()) {
                *slot += *v as f64;
            }
        }
        let n = samples.len() as f64;
        Some(Embedding::new(acc.into_iter().map(|v| (v / n) as f32).collect()))
    }
}

/// One registered identity, as persisted and matched against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Opaque unique id, generated at creation, never reused.
    pub id: String,
    /// Caller-provided display label; not guaranteed unique.
    pub name: String,
    /// Mean of `samples`. Kept for listings and diagnostics; matching uses
    /// the raw samples.
    pub embedding: Embedding,
    /// Per-sample embeddings in registration order. Never empty.
    pub samples: Vec<Embedding>,
    /// Base64-encoded JPEG crop of the first detected face, if available.
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// Build a record from at least one sample embedding.
    ///
    /// Returns `None` when `samples` is empty; a record with zero usable
    /// samples is never created.
    pub fn new(
        name: impl Into<String>,
        samples: Vec<Embedding>,
        thumbnail: Option<String>,
    ) -> Option<Self> {
        let embedding = Embedding::mean(&samples)?;
        Some(Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            embedding,
            samples,
            thumbnail,
            created_at: Utc::now(),
        })
    }
}
