use super::database::FaceDatabase;
use super::types::{BoundingBox, DetectedFace, FaceMatch};
use crate::error::FaceEngineError;
use crate::frame::Frame;

/// Face detection and embedding model
pub trait FaceEngine: Send + Sync {
    /// Detect faces in detection order, each with its embedding
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, FaceEngineError>;
}

/// Locates faces without computing embeddings, e.g. a cascade classifier
pub trait FaceDetector: Send + Sync {
    fn locate(&self, frame: &Frame) -> Result<Vec<BoundingBox>, FaceEngineError>;
}

/// Matches an embedding against registered identities
pub trait FaceMatcher: Send + Sync {
    /// Best identity for `embedding`, or the unknown sentinel when nothing
    /// reaches `threshold`
    fn best_match(
        &self,
        embedding: &[f32],
        database: &FaceDatabase,
        threshold: f32,
    ) -> Result<FaceMatch, FaceEngineError>;
}
