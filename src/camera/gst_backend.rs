use super::backend::{CameraBackend, CameraDevice};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{Frame, PixelFormat};
use gstreamer::prelude::*;
use gstreamer::{ClockTime, Pipeline, State};
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

/// How long a single read waits for the pipeline to produce a sample
const PULL_TIMEOUT_MS: u64 = 1000;

/// How long opening waits for the pipeline to reach PLAYING
const START_TIMEOUT_SECS: u64 = 3;

/// V4L2 capture through a GStreamer pipeline producing raw RGB frames
#[derive(Debug, Default, Clone)]
pub struct GstCameraBackend;

impl GstCameraBackend {
    pub fn new() -> Self {
        Self
    }

    fn build_pipeline_string(index: u32, config: &CameraConfig) -> String {
        let (width, height) = config.resolution;
        format!(
            "v4l2src device=/dev/video{} ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width={},height={} ! \
             appsink name=sink sync=false max-buffers=1 drop=true emit-signals=false",
            index, width, height
        )
    }
}

impl CameraBackend for GstCameraBackend {
    fn name(&self) -> &'static str {
        "gstreamer"
    }

    fn open(
        &self,
        index: u32,
        config: &CameraConfig,
    ) -> Result<Box<dyn CameraDevice>, CameraError> {
        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let description = Self::build_pipeline_string(index, config);
        debug!("Creating GStreamer pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| CameraError::DeviceOpen {
                index,
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::DeviceOpen {
                index,
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::DeviceOpen {
                index,
                details: "Pipeline has no appsink".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::DeviceOpen {
                index,
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        if let Err(e) = pipeline.set_state(State::Playing) {
            let _ = pipeline.set_state(State::Null);
            return Err(CameraError::DeviceOpen {
                index,
                details: format!("Failed to start pipeline: {}", e),
            });
        }

        let (result, _, _) = pipeline.state(ClockTime::from_seconds(START_TIMEOUT_SECS));
        if let Err(e) = result {
            let _ = pipeline.set_state(State::Null);
            return Err(CameraError::DeviceOpen {
                index,
                details: format!("Pipeline did not start: {}", e),
            });
        }

        info!("GStreamer pipeline for /dev/video{} is playing", index);

        Ok(Box::new(GstCameraDevice {
            index,
            pipeline,
            appsink,
        }))
    }
}

struct GstCameraDevice {
    index: u32,
    pipeline: Pipeline,
    appsink: AppSink,
}

impl GstCameraDevice {
    fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame, CameraError> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::Read {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| CameraError::Read {
            details: "No caps in sample".to_string(),
        })?;

        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::Read {
            details: format!("Failed to get video info: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;

        let map = buffer.map_readable().map_err(|e| CameraError::Read {
            details: format!("Failed to map buffer: {}", e),
        })?;
        let bytes = map.as_slice();

        // Rows may be padded; copy only the visible pixels
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let end = start + row_bytes;
            let line = bytes.get(start..end).ok_or_else(|| CameraError::Read {
                details: format!("Buffer too short for row {}", row),
            })?;
            data.extend_from_slice(line);
        }

        Ok(Frame::new(
            0,
            SystemTime::now(),
            data,
            width,
            height,
            PixelFormat::Rgb24,
        ))
    }
}

impl CameraDevice for GstCameraDevice {
    fn index(&self) -> u32 {
        self.index
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        match self
            .appsink
            .try_pull_sample(ClockTime::from_mseconds(PULL_TIMEOUT_MS))
        {
            Some(sample) => {
                let frame = Self::sample_to_frame(&sample)?;
                trace!(
                    "Pulled {}x{} frame from /dev/video{}",
                    frame.width,
                    frame.height,
                    self.index
                );
                Ok(frame)
            }
            None if self.appsink.is_eos() => Err(CameraError::Disconnected),
            None => Err(CameraError::Read {
                details: format!("No sample within {}ms", PULL_TIMEOUT_MS),
            }),
        }
    }
}

impl Drop for GstCameraDevice {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(State::Null) {
            warn!("Failed to stop pipeline for /dev/video{}: {}", self.index, e);
        }
    }
}
