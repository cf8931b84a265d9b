//! Presentation-side capabilities.
//!
//! Consumers that draw frames implement or use only the pieces they need.

use crate::capture::Frame;

/// Something refreshed once per host update cycle.
pub trait Updatable {
    /// Runs one update tick.
    fn update(&mut self);
}

/// Something exposing cached pixel data.
pub trait HasPixels {
    /// Pixels of the cached frame, empty before the first frame.
    fn pixels(&self) -> &[u8];

    /// Width of the cached frame, 0 before the first frame.
    fn width(&self) -> u32;

    /// Height of the cached frame, 0 before the first frame.
    fn height(&self) -> u32;
}

/// Receives each frame observed by an update tick, e.g. to upload a texture.
pub trait FrameUploader: Send {
    /// Handles one newly observed frame.
    fn upload(&mut self, frame: &Frame);
}

impl<F> FrameUploader for F
where
    F: FnMut(&Frame) + Send,
{
    fn upload(&mut self, frame: &Frame) {
        self(frame)
    }
}
