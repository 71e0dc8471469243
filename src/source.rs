use crate::frame::Frame;
use std::sync::Arc;

/// Anything consumers can pull the latest frame from.
///
/// Implementations never block for long and never fail loudly: device
/// trouble surfaces only as `None`.
pub trait FrameSource: Send + Sync {
    fn get_frame(&self) -> Option<Frame>;
}

impl<T: FrameSource + ?Sized> FrameSource for Arc<T> {
    fn get_frame(&self) -> Option<Frame> {
        (**self).get_frame()
    }
}
