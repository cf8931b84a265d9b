//! Grabbers: device ownership and frame hand-off.
//!
//! [`Grabber`] owns a device through a command queue and exposes a uniform
//! control surface. [`SimpleGrabber`] adds a single-slot frame hand-off for
//! consumers that poll once per update cycle, including a freshness query
//! for frames captured after a given instant.

mod base;
mod present;
mod simple;
mod slot;

pub use base::{Grabber, GrabberError};
pub use present::{FrameUploader, HasPixels, Updatable};
pub use simple::SimpleGrabber;
pub use slot::FrameSlot;
