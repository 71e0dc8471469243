use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stream server statistics and monitoring
#[derive(Debug, Default)]
pub struct StreamStats {
    active_connections: AtomicU64,
    total_connections: AtomicU64,
    frames_streamed: AtomicU64,
    placeholders_streamed: AtomicU64,
    bytes_streamed: AtomicU64,
    encode_errors: AtomicU64,
    overlay_errors: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatsSnapshot {
    pub active_connections: u64,
    pub total_connections: u64,
    pub frames_streamed: u64,
    pub placeholders_streamed: u64,
    pub bytes_streamed: u64,
    pub encode_errors: u64,
    pub overlay_errors: u64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a client for as long as the returned guard lives
    pub fn connect(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            stats: Arc::clone(self),
        }
    }

    pub(crate) fn record_frame(&self, bytes: usize) {
        self.frames_streamed.fetch_add(1, Ordering::Relaxed);
        self.bytes_streamed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_placeholder(&self, bytes: usize) {
        self.placeholders_streamed.fetch_add(1, Ordering::Relaxed);
        self.bytes_streamed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overlay_error(&self) {
        self.overlay_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            frames_streamed: self.frames_streamed.load(Ordering::Relaxed),
            placeholders_streamed: self.placeholders_streamed.load(Ordering::Relaxed),
            bytes_streamed: self.bytes_streamed.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            overlay_errors: self.overlay_errors.load(Ordering::Relaxed),
        }
    }
}

/// Decrements the active connection count on drop
#[derive(Debug)]
pub struct ConnectionGuard {
    stats: Arc<StreamStats>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.stats.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
