//! Frame type representing a captured image with metadata.

use std::time::Instant;

/// A single captured frame from the device.
///
/// Frames are immutable once built. The grabber shares them as
/// `Arc<Frame>`, so a consumer may keep an old frame for as long as it
/// likes while newer captures replace it in the hand-off slot.
#[derive(Clone)]
pub struct Frame {
    /// Raw pixel data, tightly packed, `channels` bytes per pixel.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Bytes per pixel.
    channels: u8,
    /// Capture timestamp, used for freshness and fps estimation.
    timestamp: Instant,
    /// Monotonic frame index assigned by the device.
    index: u64,
}

impl Frame {
    /// Creates a new single-channel frame stamped with the current instant.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Self {
        Self::with_timestamp(pixels, width, height, index, Instant::now())
    }

    /// Creates a single-channel frame with an explicit capture timestamp.
    pub fn with_timestamp(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        index: u64,
        timestamp: Instant,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            channels: 1,
            timestamp,
            index,
        }
    }

    /// Sets the number of bytes per pixel.
    pub fn with_channels(mut self, channels: u8) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the number of bytes per pixel.
    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the frame index.
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Returns true if the frame was captured at or after `instant`.
    #[inline]
    pub fn is_fresh_since(&self, instant: Instant) -> bool {
        self.timestamp >= instant
    }

    /// Returns the expected buffer length (width * height * channels).
    #[inline]
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.expected_len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}
