use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("could not open {source_name}: {reason}")]
    Connection { source_name: String, reason: String },
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error("frame source is not connected")]
    NotConnected,
}

/// Live frame supply (camera device or recorded stream).
///
/// `get_frame` blocks until the next frame is available. Both connection and
/// capture failures are fatal to the tracking loop.
pub trait FrameSource: Send {
    fn connect(&mut self) -> Result<(), FrameSourceError>;

    fn get_frame(&mut self) -> Result<Frame, FrameSourceError>;

    /// Releases the device. Safe to call more than once, or before `connect`.
    fn release(&mut self);
}
