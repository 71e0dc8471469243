mod backend;
mod buffer;
mod builder;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst_backend;
mod health;
mod synthetic;

pub use backend::{open_first_available, CameraBackend, CameraDevice};
pub use buffer::{CaptureStats, CaptureStatsSnapshot, FrameBuffer};
pub use builder::{backend_for, FrameBufferBuilder};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst_backend::GstCameraBackend;
pub use health::{HealthCheckResult, HealthStatus};
pub use synthetic::SyntheticCamera;
