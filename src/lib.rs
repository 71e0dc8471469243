pub mod app;
pub mod auth;
pub mod camera;
pub mod config;
pub mod error;
pub mod face;
pub mod frame;
pub mod imaging;
pub mod source;
pub mod streaming;

pub use app::{ComponentState, FacecamOrchestrator, ShutdownReason};
pub use auth::{AuthFailure, AuthOutcome, AuthVerifier, VerificationReason, VerificationResult};
pub use camera::{
    CameraBackend, CameraDevice, FrameBuffer, FrameBufferBuilder, HealthCheckResult, HealthStatus,
    SyntheticCamera,
};
pub use config::FacecamConfig;
pub use error::{FacecamError, Result};
pub use face::{
    CosineMatcher, DetectedFace, FaceDatabase, FaceDetector, FaceEngine, FaceMatch, FaceMatcher, FaceServices,
};
pub use frame::{Frame, PixelFormat};
pub use source::FrameSource;
pub use streaming::StreamPublisher;

#[cfg(feature = "streaming")]
pub use streaming::StreamServer;
