use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit red, green, blue
    Rgb24,
    /// 8-bit blue, green, red
    Bgr24,
    /// 8-bit luminance
    Gray8,
}

impl PixelFormat {
    /// Bytes (channels) per pixel
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// One captured image sample.
///
/// The pixel buffer is owned: cloning a frame deep-copies its data, so a
/// reader can keep or modify its copy without touching anyone else's.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Sequence number assigned by the frame buffer
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// Raw pixel data, row-major, tightly packed
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: PixelFormat,
}

impl Frame {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data,
            width,
            height,
            format,
        }
    }

    /// Number of channels per pixel
    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Byte length a complete frame of these dimensions must have
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.channels()
    }

    /// True when the frame has non-zero dimensions and a fully populated buffer
    pub fn is_complete(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_size()
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Check if frame is older than specified duration
    pub fn is_older_than(&self, duration: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.timestamp)
            .map(|age| age > duration)
            .unwrap_or(false)
    }

    /// Convert to an RGB image for drawing and encoding.
    ///
    /// Returns `None` for incomplete frames.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if !self.is_complete() {
            return None;
        }

        let rgb = match self.format {
            PixelFormat::Rgb24 => self.data.clone(),
            PixelFormat::Bgr24 => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
            PixelFormat::Gray8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        };

        RgbImage::from_raw(self.width, self.height, rgb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(format: PixelFormat, data: Vec<u8>) -> Frame {
        Frame::new(1, SystemTime::now(), data, 4, 2, format)
    }

    #[test]
    fn test_pixel_format_channels() {
        assert_eq!(PixelFormat::Rgb24.channels(), 3);
        assert_eq!(PixelFormat::Bgr24.channels(), 3);
        assert_eq!(PixelFormat::Gray8.channels(), 1);
    }

    #[test]
    fn test_frame_completeness() {
        assert!(frame(PixelFormat::Rgb24, vec![0u8; 4 * 2 * 3]).is_complete());
        assert!(!frame(PixelFormat::Rgb24, vec![0u8; 10]).is_complete());
        assert!(frame(PixelFormat::Gray8, vec![0u8; 8]).is_complete());

        let empty = Frame::new(1, SystemTime::now(), Vec::new(), 0, 0, PixelFormat::Rgb24);
        assert!(!empty.is_complete());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = frame(PixelFormat::Gray8, vec![7u8; 8]);
        let mut copy = original.clone();
        copy.data[0] = 99;

        assert_eq!(original.data[0], 7);
        assert_ne!(original, copy);
    }

    #[test]
    fn test_bgr_to_rgb_conversion() {
        let mut data = vec![0u8; 4 * 2 * 3];
        data[0] = 10; // blue
        data[1] = 20; // green
        data[2] = 30; // red
        let image = frame(PixelFormat::Bgr24, data).to_rgb_image().unwrap();

        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn test_gray_expands_to_rgb() {
        let image = frame(PixelFormat::Gray8, vec![42u8; 8]).to_rgb_image().unwrap();
        assert_eq!(image.get_pixel(3, 1).0, [42, 42, 42]);
    }

    #[test]
    fn test_incomplete_frame_has_no_image() {
        assert!(frame(PixelFormat::Rgb24, vec![0u8; 3]).to_rgb_image().is_none());
    }

    #[test]
    fn test_frame_age() {
        let past_time = SystemTime::now() - Duration::from_millis(100);
        let frame = Frame::new(1, past_time, vec![0u8; 8], 4, 2, PixelFormat::Gray8);

        assert!(frame.is_older_than(Duration::from_millis(50)));
        assert!(!frame.is_older_than(Duration::from_millis(10_000)));
        assert!(frame.age_ms() >= 100);
    }
}
