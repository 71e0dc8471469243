mod database;
mod engine;
mod matcher;
mod services;
mod types;

pub use database::FaceDatabase;
pub use engine::{FaceDetector, FaceEngine, FaceMatcher};
pub use matcher::{cosine_similarity, CosineMatcher};
pub use services::{EngineLoader, FaceServices};
pub use types::{BoundingBox, DetectedFace, FaceMatch, UNKNOWN_IDENTITY};
