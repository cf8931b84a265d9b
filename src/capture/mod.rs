//! Captured frames and session configuration.
//!
//! A [`Frame`] is the immutable unit the device produces and the grabber
//! hands to consumers. Configuration types describe how a session is set
//! up before capture starts.

mod config;
mod frame;

pub use config::{ConfigError, FileConfig, GrabberConfig, OutputConfig};
pub use frame::Frame;
