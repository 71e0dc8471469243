use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FacecamConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub faces: FacesConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendKind {
    /// V4L2 capture through a GStreamer pipeline
    Gstreamer,
    /// Generated test pattern, no hardware required
    Synthetic,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Primary camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Device index tried when the primary index fails to open
    #[serde(default = "default_fallback_index")]
    pub fallback_index: Option<u32>,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Capture backend
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackendKind,

    /// Pause after a failed read, in milliseconds
    #[serde(default = "default_read_backoff_ms")]
    pub read_backoff_ms: u64,

    /// Interval between reopen attempts while the device is closed, in milliseconds
    #[serde(default = "default_reopen_interval_ms")]
    pub reopen_interval_ms: u64,

    /// Sleep after every capture iteration, in milliseconds
    #[serde(default = "default_idle_yield_ms")]
    pub idle_yield_ms: u64,

    /// Consecutive read failures before the device is considered lost
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// Wall-clock budget for one verification session, in seconds
    #[serde(default = "default_max_verify_seconds")]
    pub max_seconds: f64,

    /// Pause between verification attempts, in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Minimum similarity for a face to be accepted
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    /// Expected attempts per session; reported only, never ends a session
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FacesConfig {
    /// JSON file holding registered identities and their embeddings
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// IP address to bind to
    #[serde(default = "default_stream_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Maximum frames per second pushed to each client
    #[serde(default = "default_stream_fps")]
    pub fps: u32,

    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Draw face boxes and a status caption on live frames
    #[serde(default = "default_overlay")]
    pub overlay: bool,

    /// Delay between placeholder frames while no camera frame is available, in milliseconds
    #[serde(default = "default_placeholder_interval_ms")]
    pub placeholder_interval_ms: u64,

    /// TrueType font used for captions
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Timezone for placeholder timestamps
    #[serde(default = "default_timestamp_timezone")]
    pub timestamp_timezone: String,
}

impl CameraConfig {
    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }

    pub fn reopen_interval(&self) -> Duration {
        Duration::from_millis(self.reopen_interval_ms)
    }

    pub fn idle_yield(&self) -> Duration {
        Duration::from_millis(self.idle_yield_ms)
    }

    /// Device indices in the order they should be tried
    pub fn candidate_indices(&self) -> Vec<u32> {
        let mut indices = vec![self.index];
        if let Some(fallback) = self.fallback_index {
            if fallback != self.index {
                indices.push(fallback);
            }
        }
        indices
    }
}

impl AuthConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000u64 / self.fps.max(1) as u64)
    }

    pub fn placeholder_interval(&self) -> Duration {
        Duration::from_millis(self.placeholder_interval_ms)
    }
}

impl FacecamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("facecam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. FACECAM__CAMERA__INDEX=1
            .add_source(
                Environment::with_prefix("FACECAM")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: FacecamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.camera.max_consecutive_failures == 0 {
            return Err(ConfigError::Message(
                "Camera max_consecutive_failures must be greater than 0".to_string(),
            ));
        }

        if !(self.auth.max_seconds.is_finite() && self.auth.max_seconds > 0.0) {
            return Err(ConfigError::Message(
                "Auth max_seconds must be a positive number".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.auth.match_threshold) {
            return Err(ConfigError::Message(
                "Auth match_threshold must be within [0, 1]".to_string(),
            ));
        }

        if self.stream.fps == 0 {
            return Err(ConfigError::Message(
                "Stream fps must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(ConfigError::Message(
                "Stream jpeg_quality must be within 1..=100".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: default_camera_index(),
            fallback_index: default_fallback_index(),
            resolution: default_camera_resolution(),
            fps: default_camera_fps(),
            backend: default_camera_backend(),
            read_backoff_ms: default_read_backoff_ms(),
            reopen_interval_ms: default_reopen_interval_ms(),
            idle_yield_ms: default_idle_yield_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_seconds: default_max_verify_seconds(),
            retry_interval_ms: default_retry_interval_ms(),
            match_threshold: default_match_threshold(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for FacesConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ip: default_stream_ip(),
            port: default_stream_port(),
            fps: default_stream_fps(),
            jpeg_quality: default_jpeg_quality(),
            overlay: default_overlay(),
            placeholder_interval_ms: default_placeholder_interval_ms(),
            font_path: default_font_path(),
            timestamp_timezone: default_timestamp_timezone(),
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_fallback_index() -> Option<u32> {
    Some(1)
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_backend() -> CameraBackendKind {
    if cfg!(all(feature = "camera", target_os = "linux")) {
        CameraBackendKind::Gstreamer
    } else {
        CameraBackendKind::Synthetic
    }
}
fn default_read_backoff_ms() -> u64 {
    2000
}
fn default_reopen_interval_ms() -> u64 {
    2000
}
fn default_idle_yield_ms() -> u64 {
    10
}
fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_max_verify_seconds() -> f64 {
    10.0
}
fn default_retry_interval_ms() -> u64 {
    300
}
fn default_match_threshold() -> f32 {
    0.5
}
fn default_max_attempts() -> u32 {
    15
}

fn default_database_path() -> String {
    "./faces.json".to_string()
}

fn default_stream_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_stream_port() -> u16 {
    5000
}
fn default_stream_fps() -> u32 {
    15
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_overlay() -> bool {
    true
}
fn default_placeholder_interval_ms() -> u64 {
    1000
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_timestamp_timezone() -> String {
    "UTC".to_string()
}
