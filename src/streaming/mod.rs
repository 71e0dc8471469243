#[cfg(feature = "streaming")]
mod handlers;
mod publisher;
#[cfg(feature = "streaming")]
mod server;
mod stats;
#[cfg(test)]
mod tests;

pub use publisher::{mjpeg_chunk, RenderedChunk, StreamPublisher, MJPEG_BOUNDARY};
#[cfg(feature = "streaming")]
pub use server::{StreamServer, StreamServerBuilder};
pub use stats::{ConnectionGuard, StreamStats, StreamStatsSnapshot};
