use super::backend::{open_first_available, CameraBackend, CameraDevice};
use super::health::{HealthCheckResult, HealthStatus};
use crate::config::CameraConfig;
use crate::error::{CameraError, FacecamError, Result};
use crate::frame::Frame;
use crate::source::FrameSource;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, trace, warn};

/// Longest single sleep inside the capture loop, so `stop()` is noticed promptly
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Frames older than this are reported as stale by the health check
const STALE_FRAME_AGE: Duration = Duration::from_secs(2);

/// State shared between the capture thread and readers
struct SlotState {
    latest_frame: Option<Frame>,
    running: bool,
}

/// Statistics for capture monitoring
#[derive(Debug)]
pub struct CaptureStats {
    frames_captured: AtomicU64,
    read_failures: AtomicU64,
    open_attempts: AtomicU64,
    open_failures: AtomicU64,
    device_open: AtomicBool,
    active_index: AtomicI64,
    latest_frame_id: AtomicI64,
}

/// Snapshot of capture statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureStatsSnapshot {
    pub frames_captured: u64,
    pub read_failures: u64,
    pub open_attempts: u64,
    pub open_failures: u64,
    pub device_open: bool,
    pub active_index: Option<u32>,
    /// Id of the frame currently held in the slot
    pub latest_frame_id: Option<u64>,
}

impl CaptureStats {
    fn new() -> Self {
        Self {
            frames_captured: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            open_attempts: AtomicU64::new(0),
            open_failures: AtomicU64::new(0),
            device_open: AtomicBool::new(false),
            active_index: AtomicI64::new(-1),
            latest_frame_id: AtomicI64::new(-1),
        }
    }

    fn set_device(&self, index: Option<u32>) {
        self.device_open.store(index.is_some(), Ordering::Relaxed);
        self.active_index
            .store(index.map(i64::from).unwrap_or(-1), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureStatsSnapshot {
        let active_index = self.active_index.load(Ordering::Relaxed);
        let latest_frame_id = self.latest_frame_id.load(Ordering::Relaxed);
        CaptureStatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            open_attempts: self.open_attempts.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            device_open: self.device_open.load(Ordering::Relaxed),
            active_index: u32::try_from(active_index).ok(),
            latest_frame_id: u64::try_from(latest_frame_id).ok(),
        }
    }
}

struct Shared {
    state: Mutex<SlotState>,
    stats: CaptureStats,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Replace the latest frame. The previous frame is dropped outside the lock.
    fn publish(&self, frame: Frame) {
        let id = i64::try_from(frame.id).unwrap_or(i64::MAX);
        let previous = {
            let mut state = self.state.lock();
            self.stats.latest_frame_id.store(id, Ordering::Relaxed);
            state.latest_frame.replace(frame)
        };
        drop(previous);
    }

    fn clear(&self) {
        let previous = {
            let mut state = self.state.lock();
            self.stats.latest_frame_id.store(-1, Ordering::Relaxed);
            state.latest_frame.take()
        };
        drop(previous);
    }
}

/// Single-writer, many-reader holder of the most recent camera frame.
///
/// A dedicated capture thread owns the camera device and is the only writer
/// of the frame slot. Readers call [`FrameBuffer::get_frame`] and receive an
/// owned copy; they never block the writer for longer than one clone.
pub struct FrameBuffer {
    config: CameraConfig,
    shared: Arc<Shared>,
    capture_thread: Mutex<Option<JoinHandle<()>>>,
}

impl FrameBuffer {
    /// Open the camera and spawn the capture thread.
    ///
    /// Failing to open any device is not an error: the buffer starts in a
    /// degraded state, reads return `None`, and the capture thread keeps
    /// retrying on `reopen_interval`.
    pub fn start(config: CameraConfig, backend: Arc<dyn CameraBackend>) -> Result<Self> {
        info!(
            "Starting frame buffer ({} backend, device {} fallback {:?}, {}x{} @ {}fps)",
            backend.name(),
            config.index,
            config.fallback_index,
            config.resolution.0,
            config.resolution.1,
            config.fps
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(SlotState {
                latest_frame: None,
                running: true,
            }),
            stats: CaptureStats::new(),
        });

        let mut worker = CaptureWorker {
            config: config.clone(),
            backend,
            shared: Arc::clone(&shared),
            device: None,
            consecutive_failures: 0,
            next_frame_id: 0,
        };
        worker.open_device();
        if worker.device.is_none() {
            error!("No camera device could be opened; frames unavailable until a reopen succeeds");
        }

        let handle = thread::Builder::new()
            .name("facecam-capture".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                shared.state.lock().running = false;
                FacecamError::Io(e)
            })?;

        Ok(Self {
            config,
            shared,
            capture_thread: Mutex::new(Some(handle)),
        })
    }

    /// Copy of the latest frame, or `None` when nothing has been captured
    /// yet or the device is unavailable.
    pub fn get_frame(&self) -> Option<Frame> {
        let state = self.shared.state.lock();
        let frame = state.latest_frame.clone();
        if let Some(ref f) = frame {
            trace!("Handing out copy of frame {}", f.id);
        }
        frame
    }

    /// Stop capturing, join the capture thread and release the device.
    ///
    /// Safe to call more than once. The last captured frame stays readable.
    pub fn stop(&self) {
        let was_running = {
            let mut state = self.shared.state.lock();
            std::mem::replace(&mut state.running, false)
        };

        let handle = self.capture_thread.lock().take();
        match handle {
            Some(handle) => {
                info!("Stopping frame buffer capture thread");
                if handle.join().is_err() {
                    error!("Capture thread panicked before shutdown");
                }
                self.shared.stats.set_device(None);
                info!("Frame buffer stopped");
            }
            None if was_running => {
                self.shared.stats.set_device(None);
            }
            None => debug!("Frame buffer already stopped"),
        }
    }

    /// Check if the capture thread is still supposed to run
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Check if a camera device is currently open
    pub fn is_device_open(&self) -> bool {
        self.shared.stats.device_open.load(Ordering::Relaxed)
    }

    /// Get camera configuration
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn stats(&self) -> CaptureStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Wait until a frame is available or the timeout expires
    pub async fn wait_for_frame(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.shared.state.lock().latest_frame.is_some() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Summarize capture health
    pub fn health_check(&self) -> HealthCheckResult {
        let stats = self.stats();
        let (running, last_capture) = {
            let state = self.shared.state.lock();
            (
                state.running,
                state.latest_frame.as_ref().map(|f| f.timestamp),
            )
        };

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if !running {
            issues.push("Capture thread is not running".to_string());
        }
        if !stats.device_open {
            issues.push("Camera device is not open".to_string());
        }

        match last_capture {
            None => warnings.push("No frame captured yet".to_string()),
            Some(timestamp) => {
                let age = SystemTime::now()
                    .duration_since(timestamp)
                    .unwrap_or_default();
                if age > STALE_FRAME_AGE {
                    warnings.push(format!("Latest frame is {}ms old", age.as_millis()));
                }
            }
        }

        if stats.read_failures > 0 {
            warnings.push(format!("{} frame reads failed", stats.read_failures));
        }

        let status = if !issues.is_empty() {
            HealthStatus::Unhealthy
        } else if !warnings.is_empty() {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        HealthCheckResult {
            status,
            issues,
            warnings,
            stats,
        }
    }
}

impl FrameSource for FrameBuffer {
    fn get_frame(&self) -> Option<Frame> {
        FrameBuffer::get_frame(self)
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the capture thread
struct CaptureWorker {
    config: CameraConfig,
    backend: Arc<dyn CameraBackend>,
    shared: Arc<Shared>,
    device: Option<Box<dyn CameraDevice>>,
    consecutive_failures: u32,
    next_frame_id: u64,
}

impl CaptureWorker {
    fn run(mut self) {
        info!("Capture thread started");

        while self.shared.is_running() {
            if self.device.is_some() {
                self.capture_once();
            } else {
                self.sleep_while_running(self.config.reopen_interval());
                if self.shared.is_running() {
                    warn!("Camera not opened, retrying...");
                    self.open_device();
                }
            }
        }

        self.release_device();
        info!("Capture thread stopped");
    }

    fn capture_once(&mut self) {
        let Some(device) = self.device.as_mut() else {
            return;
        };

        match device.read_frame() {
            Ok(mut frame) if frame.is_complete() => {
                frame.id = self.next_frame_id;
                self.next_frame_id += 1;
                trace!(
                    "Captured frame {} ({}x{}, {} bytes)",
                    frame.id,
                    frame.width,
                    frame.height,
                    frame.data.len()
                );

                self.shared.publish(frame);
                self.shared
                    .stats
                    .frames_captured
                    .fetch_add(1, Ordering::Relaxed);
                self.consecutive_failures = 0;

                thread::sleep(self.config.idle_yield());
            }
            Ok(frame) => {
                self.handle_read_failure(CameraError::Read {
                    details: format!(
                        "incomplete frame ({} of {} bytes)",
                        frame.data.len(),
                        frame.expected_size()
                    ),
                });
            }
            Err(e) => self.handle_read_failure(e),
        }
    }

    fn handle_read_failure(&mut self, error: CameraError) {
        self.consecutive_failures += 1;
        self.shared
            .stats
            .read_failures
            .fetch_add(1, Ordering::Relaxed);
        warn!(
            "Camera warning: can't receive frame ({}), failure {}/{}",
            error, self.consecutive_failures, self.config.max_consecutive_failures
        );

        if error == CameraError::Disconnected
            || self.consecutive_failures >= self.config.max_consecutive_failures
        {
            error!("Camera device lost; releasing it and clearing the latest frame");
            self.release_device();
            self.shared.clear();
        } else {
            self.sleep_while_running(self.config.read_backoff());
        }
    }

    fn open_device(&mut self) {
        let attempts = self.config.candidate_indices().len() as u64;
        let (device, errors) = open_first_available(self.backend.as_ref(), &self.config);

        let stats = &self.shared.stats;
        stats.open_attempts.fetch_add(
            errors.len() as u64 + u64::from(device.is_some()),
            Ordering::Relaxed,
        );
        stats
            .open_failures
            .fetch_add(errors.len() as u64, Ordering::Relaxed);
        debug!(
            "Open pass finished: {} of {} candidates failed",
            errors.len(),
            attempts
        );

        stats.set_device(device.as_ref().map(|d| d.index()));
        self.consecutive_failures = 0;
        self.device = device;
    }

    fn release_device(&mut self) {
        if let Some(device) = self.device.take() {
            info!("Releasing camera device {}", device.index());
            drop(device);
        }
        self.shared.stats.set_device(None);
    }

    fn sleep_while_running(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.shared.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
