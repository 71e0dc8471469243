use super::backend::{CameraBackend, CameraDevice};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{Frame, PixelFormat};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

/// Camera backend that generates a moving test pattern.
///
/// Used when no hardware is available and as a test double: individual
/// indices can be made to fail on open, and read failures or truncated
/// frames can be injected while a device is running.
#[derive(Clone, Default)]
pub struct SyntheticCamera {
    failing_indices: HashSet<u32>,
    read_delay: Option<Duration>,
    pending_read_failures: Arc<AtomicU32>,
    pending_truncated: Arc<AtomicU32>,
    disconnect_pending: Arc<AtomicU32>,
    open_devices: Arc<AtomicUsize>,
    total_opens: Arc<AtomicUsize>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open(index)` fail for this index
    pub fn with_failing_index(mut self, index: u32) -> Self {
        self.failing_indices.insert(index);
        self
    }

    /// Fixed delay per read instead of the configured frame interval
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Make the next `count` reads fail
    pub fn fail_next_reads(&self, count: u32) {
        self.pending_read_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` reads return frames with half their pixel data
    pub fn truncate_next_reads(&self, count: u32) {
        self.pending_truncated.store(count, Ordering::SeqCst);
    }

    /// Make the next read report a disconnected device
    pub fn disconnect(&self) {
        self.disconnect_pending.store(1, Ordering::SeqCst);
    }

    /// Number of devices currently open (not yet released)
    pub fn open_device_count(&self) -> usize {
        self.open_devices.load(Ordering::SeqCst)
    }

    /// Number of successful opens since creation
    pub fn total_opens(&self) -> usize {
        self.total_opens.load(Ordering::SeqCst)
    }
}

impl CameraBackend for SyntheticCamera {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(
        &self,
        index: u32,
        config: &CameraConfig,
    ) -> Result<Box<dyn CameraDevice>, CameraError> {
        if self.failing_indices.contains(&index) {
            return Err(CameraError::DeviceOpen {
                index,
                details: "synthetic device configured to fail".to_string(),
            });
        }

        let (width, height) = config.resolution;
        let read_delay = self
            .read_delay
            .unwrap_or_else(|| Duration::from_millis(1000 / config.fps.max(1) as u64));

        self.open_devices.fetch_add(1, Ordering::SeqCst);
        self.total_opens.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Opened synthetic camera {} ({}x{}, {:?} per frame)",
            index, width, height, read_delay
        );

        Ok(Box::new(SyntheticDevice {
            index,
            width,
            height,
            read_delay,
            sequence: 0,
            pending_read_failures: Arc::clone(&self.pending_read_failures),
            pending_truncated: Arc::clone(&self.pending_truncated),
            disconnect_pending: Arc::clone(&self.disconnect_pending),
            open_devices: Arc::clone(&self.open_devices),
        }))
    }
}

struct SyntheticDevice {
    index: u32,
    width: u32,
    height: u32,
    read_delay: Duration,
    sequence: u64,
    pending_read_failures: Arc<AtomicU32>,
    pending_truncated: Arc<AtomicU32>,
    disconnect_pending: Arc<AtomicU32>,
    open_devices: Arc<AtomicUsize>,
}

impl CameraDevice for SyntheticDevice {
    fn index(&self) -> u32 {
        self.index
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        std::thread::sleep(self.read_delay);

        if self
            .disconnect_pending
            .compare_exchange(1, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return Err(CameraError::Disconnected);
        }

        let injected = self
            .pending_read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(CameraError::Read {
                details: "injected synthetic read failure".to_string(),
            });
        }

        self.sequence += 1;
        let shift = (self.sequence % 256) as u8;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push((x as u8).wrapping_add(shift));
                data.push((y as u8).wrapping_add(shift));
                data.push(shift);
            }
        }

        if self
            .pending_truncated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            data.truncate(data.len() / 2);
        }

        trace!("Generated synthetic frame {} on device {}", self.sequence, self.index);

        Ok(Frame::new(
            self.sequence,
            SystemTime::now(),
            data,
            self.width,
            self.height,
            PixelFormat::Rgb24,
        ))
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.open_devices.fetch_sub(1, Ordering::SeqCst);
    }
}
