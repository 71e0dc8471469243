//! Frame annotation, placeholder rendering and JPEG encoding for the stream

mod encode;
mod overlay;
mod placeholder;
#[cfg(test)]
mod tests;

pub use encode::encode_jpeg;
pub use overlay::{load_font, FaceLocator, OverlayRenderer};
pub use placeholder::{resolve_timestamp_timezone, PlaceholderRenderer, PLACEHOLDER_CAPTION};
