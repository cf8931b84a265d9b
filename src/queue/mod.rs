//! Command serialization for blocking devices.
//!
//! This module provides the [`CommandQueue`], which owns a device on a
//! dedicated thread and executes [`Command`]s one at a time in submission
//! order, together with the lifecycle [`DeviceState`] those commands drive.

mod command;
mod state;
mod worker;

pub use command::Command;
pub use state::DeviceState;
pub use worker::{
    CommandFailure, CommandQueue, ErrorListener, FrameListener, QueueError, QueueStats,
};
