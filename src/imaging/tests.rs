use super::*;
use crate::error::FaceEngineError;
use crate::face::{BoundingBox, DetectedFace, FaceDetector, FaceEngine, FaceServices};
use crate::frame::{Frame, PixelFormat};
use chrono::{TimeZone, Utc};
use image::Rgb;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

struct FixedLocator(Option<Vec<BoundingBox>>);

impl FaceLocator for FixedLocator {
    fn locate_faces(&self, _frame: &Frame) -> Result<Option<Vec<BoundingBox>>, FaceEngineError> {
        Ok(self.0.clone())
    }
}

struct BrokenLocator;

impl FaceLocator for BrokenLocator {
    fn locate_faces(&self, _frame: &Frame) -> Result<Option<Vec<BoundingBox>>, FaceEngineError> {
        Err(FaceEngineError::Detection {
            details: "no model".to_string(),
        })
    }
}

struct CountingEngine(AtomicUsize);

impl FaceEngine for CountingEngine {
    fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, FaceEngineError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(vec![DetectedFace {
            bbox: BoundingBox::new(1, 1, 4, 4),
            embedding: vec![1.0, 0.0],
            score: 0.9,
        }])
    }
}

struct CascadeDetector;

impl FaceDetector for CascadeDetector {
    fn locate(&self, _frame: &Frame) -> Result<Vec<BoundingBox>, FaceEngineError> {
        Ok(vec![BoundingBox::new(2, 2, 6, 6), BoundingBox::new(10, 2, 6, 6)])
    }
}

fn gray_frame(width: u32, height: u32) -> Frame {
    Frame::new(
        3,
        SystemTime::now(),
        vec![100; (width * height * 3) as usize],
        width,
        height,
        PixelFormat::Rgb24,
    )
}

#[test]
fn test_encode_jpeg_produces_decodable_image() {
    let image = gray_frame(64, 48).to_rgb_image().unwrap();
    let jpeg = encode_jpeg(&image, 80).unwrap();

    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!(decoded.width(), 64);
    assert_eq!(decoded.height(), 48);
}

#[test]
fn test_lower_quality_is_smaller() {
    let mut image = gray_frame(64, 48).to_rgb_image().unwrap();
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = Rgb([(x * 4) as u8, (y * 5) as u8, ((x + y) * 3) as u8]);
    }

    let high = encode_jpeg(&image, 95).unwrap();
    let low = encode_jpeg(&image, 10).unwrap();
    assert!(low.len() < high.len());
}

#[test]
fn test_overlay_draws_face_boxes() {
    let frame = gray_frame(64, 48);
    let mut image = frame.to_rgb_image().unwrap();
    let renderer = OverlayRenderer::new(
        Arc::new(FixedLocator(Some(vec![BoundingBox::new(10, 10, 20, 20)]))),
        None,
    );

    let faces = renderer.annotate(&frame, &mut image).unwrap();

    assert_eq!(faces, 1);
    assert_eq!(*image.get_pixel(10, 10), Rgb([0, 255, 0]));
    assert_eq!(*image.get_pixel(29, 15), Rgb([0, 255, 0]));
    // Inside the box stays untouched
    assert_eq!(*image.get_pixel(20, 20), Rgb([100, 100, 100]));
}

#[test]
fn test_overlay_clips_boxes_at_frame_edge() {
    let frame = gray_frame(32, 24);
    let mut image = frame.to_rgb_image().unwrap();
    let renderer = OverlayRenderer::new(
        Arc::new(FixedLocator(Some(vec![
            BoundingBox::new(-5, -5, 100, 100),
            BoundingBox::new(3, 3, 0, 0),
        ]))),
        None,
    );

    assert_eq!(renderer.annotate(&frame, &mut image).unwrap(), 2);
}

#[test]
fn test_overlay_without_detector_is_monitoring_only() {
    let frame = gray_frame(32, 24);
    let mut image = frame.to_rgb_image().unwrap();
    let original = image.clone();

    let renderer = OverlayRenderer::new(Arc::new(FaceServices::new()), None);
    assert_eq!(renderer.annotate(&frame, &mut image).unwrap(), 0);
    assert_eq!(image, original);

    let renderer = OverlayRenderer::new(Arc::new(FixedLocator(None)), None);
    assert_eq!(renderer.annotate(&frame, &mut image).unwrap(), 0);
}

#[test]
fn test_services_locator_prefers_detector_over_engine() {
    let frame = gray_frame(32, 24);
    let engine = Arc::new(CountingEngine(AtomicUsize::new(0)));
    let services = FaceServices::new().with_engine(engine.clone());

    // Engine only: boxes come from full detection
    assert_eq!(services.locate_faces(&frame).unwrap().map(|b| b.len()), Some(1));
    assert_eq!(engine.0.load(Ordering::SeqCst), 1);

    services.install_detector(Arc::new(CascadeDetector));
    let renderer = OverlayRenderer::new(Arc::new(services), None);
    let mut image = frame.to_rgb_image().unwrap();
    assert_eq!(renderer.annotate(&frame, &mut image).unwrap(), 2);
    assert_eq!(engine.0.load(Ordering::SeqCst), 1);
}

#[test]
fn test_overlay_failure_leaves_image_untouched() {
    let frame = gray_frame(32, 24);
    let mut image = frame.to_rgb_image().unwrap();
    let original = image.clone();

    let renderer = OverlayRenderer::new(Arc::new(BrokenLocator), None);
    assert!(renderer.annotate(&frame, &mut image).is_err());
    assert_eq!(image, original);
}

#[test]
fn test_missing_font_is_none() {
    assert!(load_font("/nonexistent/font.ttf").is_none());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.ttf");
    std::fs::write(&path, b"not a font").unwrap();
    assert!(load_font(path.to_str().unwrap()).is_none());
}

#[test]
fn test_placeholder_frame() {
    let renderer = PlaceholderRenderer::new(None, resolve_timestamp_timezone("UTC"));
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

    let image = renderer.render(now);
    assert_eq!(image.dimensions(), (640, 480));
    assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
    assert_eq!(renderer.timestamp_text(now), "2024-05-01 12:30:00 UTC");
}

#[test]
fn test_placeholder_timezone() {
    let renderer = PlaceholderRenderer::new(None, resolve_timestamp_timezone("Asia/Tokyo"));
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

    assert_eq!(renderer.timestamp_text(now), "2024-05-01 21:30:00 JST");
    assert_eq!(resolve_timestamp_timezone("Not/AZone"), chrono_tz::UTC);
}
