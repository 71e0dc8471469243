use crate::error::FaceEngineError;
use crate::face::{BoundingBox, FaceServices};
use crate::frame::Frame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;
const CAPTION_SCALE: f32 = 22.0;

/// Finds face regions for the stream overlay
pub trait FaceLocator: Send + Sync {
    /// Face boxes in `frame`, or `None` while no detector is available
    fn locate_faces(&self, frame: &Frame) -> Result<Option<Vec<BoundingBox>>, FaceEngineError>;
}

/// Prefers the registered box-only detector and falls back to the full engine
impl FaceLocator for FaceServices {
    fn locate_faces(&self, frame: &Frame) -> Result<Option<Vec<BoundingBox>>, FaceEngineError> {
        if let Some(detector) = self.detector() {
            return detector.locate(frame).map(Some);
        }
        let Some(engine) = self.engine() else {
            return Ok(None);
        };
        let faces = engine.detect(frame)?;
        Ok(Some(faces.into_iter().map(|face| face.bbox).collect()))
    }
}

impl<T: FaceLocator + ?Sized> FaceLocator for Arc<T> {
    fn locate_faces(&self, frame: &Frame) -> Result<Option<Vec<BoundingBox>>, FaceEngineError> {
        (**self).locate_faces(frame)
    }
}

/// Read a TrueType font, returning `None` (with a warning) when it is unusable
pub fn load_font(path: &str) -> Option<Font<'static>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to read font file '{}': {}; captions disabled", path, e);
            return None;
        }
    };

    let font = Font::try_from_vec(data);
    if font.is_none() {
        warn!("Failed to parse font file '{}'; captions disabled", path);
    }
    font
}

/// Draws face boxes and a status caption onto live frames
pub struct OverlayRenderer {
    locator: Arc<dyn FaceLocator>,
    font: Option<Arc<Font<'static>>>,
}

impl OverlayRenderer {
    pub fn new(locator: Arc<dyn FaceLocator>, font: Option<Arc<Font<'static>>>) -> Self {
        Self { locator, font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Annotate `image`, which must be the RGB rendering of `frame`.
    ///
    /// Returns the number of faces drawn. On error the image is left
    /// untouched.
    pub fn annotate(&self, frame: &Frame, image: &mut RgbImage) -> Result<usize, FaceEngineError> {
        let located = panic::catch_unwind(AssertUnwindSafe(|| self.locator.locate_faces(frame)))
            .map_err(|_| FaceEngineError::Detection {
                details: "face locator panicked".to_string(),
            })??;

        let boxes = located.unwrap_or_default();
        for bbox in &boxes {
            draw_face_box(image, bbox);
        }

        let status = if boxes.is_empty() {
            "Status: Monitoring".to_string()
        } else {
            format!("Status: Face Detected ({})", boxes.len())
        };
        if let Some(font) = self.font.as_deref() {
            draw_label(image, font, &status, 10, 10);
        }

        debug!("Overlay on frame {}: {}", frame.id, status);
        Ok(boxes.len())
    }
}

fn draw_face_box(image: &mut RgbImage, bbox: &BoundingBox) {
    for inset in 0..BOX_THICKNESS {
        let width = bbox.width as i32 - 2 * inset;
        let height = bbox.height as i32 - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x + inset, bbox.y + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}

/// Draw white text over a darkened backing box
pub(crate) fn draw_label(image: &mut RgbImage, font: &Font<'_>, text: &str, x: u32, y: u32) {
    let scale = Scale::uniform(CAPTION_SCALE);
    let (text_width, text_height) = text_size(scale, font, text);

    for dy in 0..(text_height.max(0) as u32 + 10) {
        for dx in 0..(text_width.max(0) as u32 + 10) {
            let px = x.saturating_sub(5) + dx;
            let py = y.saturating_sub(5) + dy;
            if px < image.width() && py < image.height() {
                let pixel = image.get_pixel(px, py);
                let dimmed = Rgb([pixel[0] / 3, pixel[1] / 3, pixel[2] / 3]);
                image.put_pixel(px, py, dimmed);
            }
        }
    }

    draw_text_mut(
        image,
        Rgb([255, 255, 255]),
        x as i32,
        y as i32,
        scale,
        font,
        text,
    );
}
