use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::Frame;
use tracing::{info, warn};

/// An open camera device.
///
/// A device is owned by exactly one capture thread; dropping it releases the
/// underlying hardware handle.
pub trait CameraDevice: Send {
    /// Index the device was opened with
    fn index(&self) -> u32;

    /// Block until the next frame is available
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Opens camera devices by index
pub trait CameraBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    fn open(
        &self,
        index: u32,
        config: &CameraConfig,
    ) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// Try the primary index, then the fallback index.
///
/// Returns `None` when every candidate fails; the caller stays in a degraded
/// state and retries later.
pub fn open_first_available(
    backend: &dyn CameraBackend,
    config: &CameraConfig,
) -> (Option<Box<dyn CameraDevice>>, Vec<CameraError>) {
    let mut errors = Vec::new();

    for index in config.candidate_indices() {
        match backend.open(index, config) {
            Ok(device) => {
                info!("Camera opened on device {} ({})", index, backend.name());
                return (Some(device), errors);
            }
            Err(e) => {
                warn!("Could not open camera device {}: {}", index, e);
                errors.push(e);
            }
        }
    }

    (None, errors)
}
