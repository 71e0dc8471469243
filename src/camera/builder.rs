use super::backend::CameraBackend;
use super::buffer::FrameBuffer;
use super::synthetic::SyntheticCamera;
use crate::config::{CameraBackendKind, CameraConfig};
use crate::error::{CameraError, FacecamError, Result};
use std::sync::Arc;

/// Builder for the shared frame buffer
pub struct FrameBufferBuilder {
    config: Option<CameraConfig>,
    backend: Option<Arc<dyn CameraBackend>>,
}

impl FrameBufferBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            backend: None,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use this backend instead of the one named in the configuration
    pub fn backend(mut self, backend: Arc<dyn CameraBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Open the camera and start the capture thread
    pub fn start(self) -> Result<FrameBuffer> {
        let config = self
            .config
            .ok_or_else(|| FacecamError::system("Camera configuration must be specified"))?;
        validate_camera_config(&config)?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => backend_for(config.backend)?,
        };

        FrameBuffer::start(config, backend)
    }
}

fn validate_camera_config(config: &CameraConfig) -> std::result::Result<(), CameraError> {
    let (width, height) = config.resolution;
    if width == 0 || height == 0 {
        return Err(CameraError::Configuration {
            details: format!("invalid resolution {}x{}", width, height),
        });
    }
    if config.fps == 0 {
        return Err(CameraError::Configuration {
            details: "fps must be greater than 0".to_string(),
        });
    }
    if config.max_consecutive_failures == 0 {
        return Err(CameraError::Configuration {
            details: "max_consecutive_failures must be greater than 0".to_string(),
        });
    }
    Ok(())
}

impl Default for FrameBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the configured backend kind to an implementation
pub fn backend_for(kind: CameraBackendKind) -> Result<Arc<dyn CameraBackend>> {
    match kind {
        CameraBackendKind::Synthetic => Ok(Arc::new(SyntheticCamera::new())),
        #[cfg(all(feature = "camera", target_os = "linux"))]
        CameraBackendKind::Gstreamer => Ok(Arc::new(super::gst_backend::GstCameraBackend::new())),
        #[cfg(not(all(feature = "camera", target_os = "linux")))]
        CameraBackendKind::Gstreamer => Err(CameraError::Configuration {
            details: "GStreamer capture requires Linux and the `camera` feature".to_string(),
        }
        .into()),
    }
}
