//! Frame Grabber Library
//!
//! Drives capture devices whose SDKs only tolerate one call at a time.
//! Every device operation runs on a single dedicated command thread, and
//! captured frames are handed to consumers through a newest-wins slot.
//!
//! # Architecture
//!
//! ```text
//! caller ── Command ──▶ CommandQueue thread ──▶ Device
//!                              │
//!                         Arc<Frame>
//!                              ▼
//!                      FrameSlot ──▶ SimpleGrabber::update / get_fresh_frame
//! ```
//!
//! # Design Principles
//!
//! - **One caller**: the device is only ever touched by the command thread
//! - **FIFO commands**: commands run in submission order, one at a time
//! - **Newest wins**: a consumer that falls behind sees the latest frame only
//! - **Freshness**: a fresh-frame request never returns a frame captured
//!   before the request was made
//!
//! # Example
//!
//! ```no_run
//! use frame_grabber::{
//!     device::{MockConfig, MockDevice, TriggerSettings},
//!     grabber::{HasPixels, SimpleGrabber, Updatable},
//! };
//!
//! let mut grabber = SimpleGrabber::new(MockDevice::new(MockConfig::default())).unwrap();
//! grabber.open(0).unwrap();
//! grabber.start_capture(TriggerSettings::default()).unwrap();
//!
//! // Wait for a frame taken after this point
//! let frame = grabber.fresh_frame(false).unwrap();
//! println!("{}x{} frame #{}", frame.width(), frame.height(), frame.index());
//!
//! // Poll once per host update cycle
//! grabber.update();
//! if grabber.is_frame_new() {
//!     println!("{} bytes, fps {:?}", grabber.pixels().len(), grabber.fps());
//! }
//!
//! grabber.close().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod device;
pub mod grabber;
pub mod metrics;
pub mod queue;

// Re-export commonly used types at crate root
pub use capture::{ConfigError, FileConfig, Frame, GrabberConfig};
pub use device::{Device, DeviceError, DeviceKind, MockConfig, MockDevice};
pub use grabber::{FrameSlot, Grabber, GrabberError, HasPixels, SimpleGrabber, Updatable};
pub use queue::{Command, CommandQueue, DeviceState, QueueError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
