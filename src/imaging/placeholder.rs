use super::overlay::draw_label;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use image::RgbImage;
use rusttype::Font;
use std::sync::Arc;

pub const PLACEHOLDER_CAPTION: &str = "Wait for Camera...";

const PLACEHOLDER_WIDTH: u32 = 640;
const PLACEHOLDER_HEIGHT: u32 = 480;

/// Resolve configured timezone, falling back to UTC on parse errors
pub fn resolve_timestamp_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(
                "Invalid timestamp timezone '{}', falling back to UTC",
                tz_name
            );
            chrono_tz::UTC
        }
    }
}

/// Black frame shown while the camera has nothing to offer
pub struct PlaceholderRenderer {
    font: Option<Arc<Font<'static>>>,
    timezone: Tz,
}

impl PlaceholderRenderer {
    pub fn new(font: Option<Arc<Font<'static>>>, timezone: Tz) -> Self {
        Self { font, timezone }
    }

    pub fn timestamp_text(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
    }

    pub fn render(&self, now: DateTime<Utc>) -> RgbImage {
        let mut image = RgbImage::new(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);

        if let Some(font) = self.font.as_deref() {
            draw_label(&mut image, font, PLACEHOLDER_CAPTION, 50, 240);
            draw_label(&mut image, font, &self.timestamp_text(now), 50, 280);
        }

        image
    }
}
