//! Capture device capability.
//!
//! This module defines the blocking operations the grabber needs from a
//! capture device, the typed settings those operations take, and a mock
//! implementation for testing without hardware.

mod capability;
mod mock;
pub(crate) mod settings;

pub use capability::{Device, DeviceError, DeviceKind};
pub use mock::{DeviceCall, FrameFeeder, Journal, MockConfig, MockDevice};
pub use settings::{Binning, GpoMode, Roi, TriggerMode, TriggerSettings, TriggerSignal};
