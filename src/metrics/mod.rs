//! Prometheus metrics exporter for grabber monitoring.
//!
//! # Metrics Exposed
//!
//! ## Command Metrics
//! - `frame_grabber_commands_executed_total` - Commands executed by the worker
//! - `frame_grabber_command_failures_total` - Commands the device rejected
//!
//! ## Frame Metrics
//! - `frame_grabber_frames_published_total` - Frames published by the worker
//! - `frame_grabber_frame_errors_total` - Failed frame pulls
//! - `frame_grabber_frames_overwritten_total` - Frames replaced before a consumer tick
//! - `frame_grabber_fps` - Frame rate seen by the consumer
//!
//! ## Device Metrics
//! - `frame_grabber_device_state` - Lifecycle state code
//!
//! # Example
//!
//! ```no_run
//! use frame_grabber::device::{MockConfig, MockDevice};
//! use frame_grabber::grabber::SimpleGrabber;
//! use frame_grabber::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let grabber = SimpleGrabber::new(MockDevice::new(MockConfig::default())).unwrap();
//!
//! registry.update(&MetricsSnapshot::from_grabber(&grabber));
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
