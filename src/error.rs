use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacecamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Face database error: {0}")]
    FaceDb(#[from] FaceDbError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl FacecamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by camera backends and devices
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Failed to open camera device {index}: {details}")]
    DeviceOpen { index: u32, details: String },

    #[error("Failed to read frame: {details}")]
    Read { details: String },

    #[error("Camera device disconnected")]
    Disconnected,

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },
}

/// Errors raised while serving the MJPEG stream
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream server startup failed: {details}")]
    StartupFailed { details: String },

    #[error("Frame encoding failed: {details}")]
    Encoding { details: String },
}

/// Errors raised by the face engine and matcher collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FaceEngineError {
    #[error("Face detection failed: {details}")]
    Detection { details: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Face matching failed: {details}")]
    Matching { details: String },
}

/// Errors raised while loading or saving the face database
#[derive(Error, Debug)]
pub enum FaceDbError {
    #[error("Failed to read face database {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse face database {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write face database {path}: {details}")]
    Write { path: String, details: String },

    #[error("Invalid embedding for '{identity}': {details}")]
    InvalidEmbedding { identity: String, details: String },
}

pub type Result<T> = std::result::Result<T, FacecamError>;
