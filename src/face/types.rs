use serde::{Deserialize, Serialize};

/// Identity reported by a matcher when no registered face clears the threshold
pub const UNKNOWN_IDENTITY: &str = "Unknown";

/// Axis-aligned face region in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A face found by the engine in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    /// Identity feature vector
    pub embedding: Vec<f32>,
    /// Detector confidence
    pub score: f32,
}

/// Result of matching one embedding against the face database
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub identity: String,
    pub score: f32,
}

impl FaceMatch {
    pub fn unknown(score: f32) -> Self {
        Self {
            identity: UNKNOWN_IDENTITY.to_string(),
            score,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.identity == UNKNOWN_IDENTITY
    }
}
