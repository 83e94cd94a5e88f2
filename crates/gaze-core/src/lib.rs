//! gaze-core: face detection, embedding, matching, and registration
//! aggregation for the gaze daemon.
//!
//! Detection uses UltraFace and embedding uses an ArcFace-style model, both
//! running via ONNX Runtime for CPU inference. Everything above the
//! [`FaceAnalyzer`] seam treats them as opaque functions, so the matcher and
//! the registration aggregator can be tested without model files.

pub mod analyzer;
pub mod detector;
pub mod embedder;
pub mod enroll;
pub mod matcher;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use enroll::{collect_enrollment, EnrollError, Enrollment};
pub use matcher::{MatchResult, Matcher, NearestSampleMatcher};
pub use types::{Embedding, FaceBox, IdentityRecord};
