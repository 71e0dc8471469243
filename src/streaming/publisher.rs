use super::stats::StreamStats;
use crate::config::StreamConfig;
use crate::frame::Frame;
use crate::imaging::{
    encode_jpeg, load_font, resolve_timestamp_timezone, FaceLocator, OverlayRenderer,
    PlaceholderRenderer,
};
use crate::source::FrameSource;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;
use futures::Stream;
use image::RgbImage;
use rusttype::Font;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Multipart boundary separating JPEG parts
pub const MJPEG_BOUNDARY: &str = "frame";

/// Wrap one JPEG image as a multipart part
pub fn mjpeg_chunk(jpeg: &[u8]) -> Bytes {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", MJPEG_BOUNDARY);
    let mut chunk = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    chunk.put_slice(header.as_bytes());
    chunk.put_slice(jpeg);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}

/// One encoded stream part
#[derive(Debug, Clone)]
pub struct RenderedChunk {
    pub data: Bytes,
    pub is_placeholder: bool,
}

/// Turns the latest camera frames into an endless MJPEG part sequence.
///
/// Live frames are optionally annotated and paced to the configured rate.
/// While the camera has nothing, a placeholder is emitted and the sequence
/// backs off before trying again.
pub struct StreamPublisher {
    source: Arc<dyn FrameSource>,
    overlay: Option<OverlayRenderer>,
    placeholder: PlaceholderRenderer,
    font: Option<Arc<Font<'static>>>,
    config: StreamConfig,
    stats: Arc<StreamStats>,
}

impl StreamPublisher {
    pub fn new(source: Arc<dyn FrameSource>, config: StreamConfig) -> Self {
        let font = load_font(&config.font_path).map(Arc::new);
        let timezone = resolve_timestamp_timezone(&config.timestamp_timezone);

        Self {
            source,
            overlay: None,
            placeholder: PlaceholderRenderer::new(font.clone(), timezone),
            font,
            config,
            stats: Arc::new(StreamStats::new()),
        }
    }

    /// Replace the caption font; `None` disables captions
    pub fn with_font(mut self, font: Option<Arc<Font<'static>>>) -> Self {
        let timezone = resolve_timestamp_timezone(&self.config.timestamp_timezone);
        self.placeholder = PlaceholderRenderer::new(font.clone(), timezone);
        self.font = font;
        self
    }

    /// Annotate live frames with faces found by `locator`
    pub fn with_overlay(mut self, locator: Arc<dyn FaceLocator>) -> Self {
        self.overlay = Some(OverlayRenderer::new(locator, self.font.clone()));
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    /// Produce the next part from the current camera state.
    ///
    /// Returns `None` when the image could not be encoded; the caller moves
    /// on to the next element.
    pub fn render_next(&self) -> Option<RenderedChunk> {
        match self.source.get_frame() {
            Some(frame) => {
                let data = self.render_live(&frame)?;
                self.stats.record_frame(data.len());
                Some(RenderedChunk {
                    data,
                    is_placeholder: false,
                })
            }
            None => {
                trace!("No frame available; sending placeholder");
                let data = self.encode(&self.placeholder.render(Utc::now()))?;
                self.stats.record_placeholder(data.len());
                Some(RenderedChunk {
                    data,
                    is_placeholder: true,
                })
            }
        }
    }

    fn render_live(&self, frame: &Frame) -> Option<Bytes> {
        let Some(mut image) = frame.to_rgb_image() else {
            warn!(
                "Frame {} has {} bytes, expected {}; skipping",
                frame.id,
                frame.data.len(),
                frame.expected_size()
            );
            self.stats.record_encode_error();
            return None;
        };

        if let Some(overlay) = &self.overlay {
            if let Err(e) = overlay.annotate(frame, &mut image) {
                warn!("Overlay failed on frame {}: {}", frame.id, e);
                self.stats.record_overlay_error();
            }
        }

        self.encode(&image)
    }

    fn encode(&self, image: &RgbImage) -> Option<Bytes> {
        match encode_jpeg(image, self.config.jpeg_quality) {
            Ok(jpeg) => Some(mjpeg_chunk(&jpeg)),
            Err(e) => {
                error!("Failed to encode stream frame: {}", e);
                self.stats.record_encode_error();
                None
            }
        }
    }

    /// Endless sequence of multipart parts for one client
    pub fn frames(self: Arc<Self>) -> impl Stream<Item = Bytes> + Send + 'static {
        async_stream::stream! {
            let _connection = self.stats.connect();
            info!("MJPEG client connected ({} active)", self.stats.snapshot().active_connections);

            let mut ticker = interval(self.config.frame_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let publisher = Arc::clone(&self);
                let rendered = match tokio::task::spawn_blocking(move || publisher.render_next()).await {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        error!("Stream render task failed: {}", e);
                        None
                    }
                };

                if let Some(chunk) = rendered {
                    let is_placeholder = chunk.is_placeholder;
                    yield chunk.data;

                    if is_placeholder {
                        debug!("Camera idle; next placeholder in {:?}", self.config.placeholder_interval());
                        tokio::time::sleep(self.config.placeholder_interval()).await;
                    }
                }
            }
        }
    }
}
