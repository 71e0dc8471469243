use crate::error::StreamError;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};

/// Encode an RGB image as baseline JPEG at the given quality (1-100)
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, StreamError> {
    let mut output = Vec::with_capacity(image.as_raw().len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
    encoder
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(|e| StreamError::Encoding {
            details: e.to_string(),
        })?;
    Ok(output)
}
