//! Grabber base: device ownership and control surface.

use crate::capture::{Frame, GrabberConfig};
use crate::device::{Binning, Device, DeviceKind, GpoMode, Roi, TriggerSettings};
use crate::queue::{
    Command, CommandFailure, CommandQueue, DeviceState, QueueError, QueueStats,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by grabber operations.
#[derive(Debug, Error)]
pub enum GrabberError {
    /// The device kind cannot be driven; the grabber was not created.
    #[error("device kind is not supported by this grabber")]
    UnsupportedDevice,
    /// The command queue rejected the call.
    #[error(transparent)]
    Queue(QueueError),
    /// The device did not reach the open state.
    #[error("device {device_id} failed to open")]
    OpenFailed {
        /// Index passed to `open`.
        device_id: u32,
    },
    /// A setting value was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No frame newer than the request arrived in time.
    #[error("no fresh frame within {timeout:?}")]
    FreshFrameTimeout {
        /// How long the caller waited.
        timeout: Duration,
    },
}

impl From<QueueError> for GrabberError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::InvalidCommand(e) => Self::InvalidArgument(e.to_string()),
            other => Self::Queue(other),
        }
    }
}

/// Owns a device through its command queue and tracks its lifecycle.
///
/// Every control call is executed on the queue's worker thread, one at a
/// time. `open` and `close` block until the device has finished; the other
/// setters return as soon as the command is queued.
///
/// Dropping the grabber marks the state as [`DeviceState::Deleting`], then
/// stops and joins the worker. A command already running finishes first;
/// queued commands are discarded.
pub struct Grabber {
    queue: CommandQueue,
}

impl Grabber {
    /// Creates a grabber for `device`.
    ///
    /// Fails with [`GrabberError::UnsupportedDevice`] if the device reports
    /// [`DeviceKind::NotImplemented`].
    pub fn new(device: impl Device + 'static) -> Result<Self, GrabberError> {
        Self::from_boxed(Box::new(device))
    }

    /// Creates a grabber for an already boxed device.
    pub fn from_boxed(device: Box<dyn Device>) -> Result<Self, GrabberError> {
        match device.kind() {
            DeviceKind::Blocking => {
                let queue = CommandQueue::spawn(device)?;
                tracing::debug!("grabber created for blocking device");
                Ok(Self { queue })
            }
            DeviceKind::NotImplemented => {
                tracing::error!("device kind not implemented");
                Err(GrabberError::UnsupportedDevice)
            }
        }
    }

    /// Opens the device and waits for the result.
    pub fn open(&self, device_id: u32) -> Result<(), GrabberError> {
        self.queue.open(device_id)?;
        if self.state().is_open() {
            Ok(())
        } else {
            Err(GrabberError::OpenFailed { device_id })
        }
    }

    /// Closes the device and waits until it is closed.
    pub fn close(&self) -> Result<(), GrabberError> {
        self.queue.close()?;
        Ok(())
    }

    /// Starts free-run capture.
    pub fn start_capture(&self) -> Result<(), GrabberError> {
        Ok(self.queue.start_free_run(false)?)
    }

    /// Stops free-run capture.
    pub fn stop_capture(&self) -> Result<(), GrabberError> {
        Ok(self.queue.stop_free_run(false)?)
    }

    /// Captures one frame outside free-run mode and publishes it.
    pub fn single_shot(&self) -> Result<(), GrabberError> {
        Ok(self.queue.single_shot(false)?)
    }

    /// Queues new binning factors.
    pub fn set_binning(&self, binning_x: u32, binning_y: u32) -> Result<(), GrabberError> {
        Ok(self
            .queue
            .set_binning(Binning::new(binning_x, binning_y), false)?)
    }

    /// Queues a new region of interest.
    pub fn set_roi(&self, roi: Roi) -> Result<(), GrabberError> {
        Ok(self.queue.set_roi(roi, false)?)
    }

    /// Queues new trigger settings.
    pub fn set_trigger_mode(&self, trigger: TriggerSettings) -> Result<(), GrabberError> {
        Ok(self.queue.set_trigger_mode(trigger, false)?)
    }

    /// Queues a new general purpose output mode.
    pub fn set_gpo_mode(&self, mode: GpoMode) -> Result<(), GrabberError> {
        Ok(self.queue.set_gpo_mode(mode, false)?)
    }

    /// Queues a fixed exposure time.
    pub fn set_exposure(&self, exposure: Duration) -> Result<(), GrabberError> {
        Ok(self.queue.set_exposure(exposure, false)?)
    }

    /// Queues a normalized gain.
    pub fn set_gain(&self, gain: f32) -> Result<(), GrabberError> {
        Ok(self.queue.set_gain(gain, false)?)
    }

    /// Queues a normalized focus.
    pub fn set_focus(&self, focus: f32) -> Result<(), GrabberError> {
        Ok(self.queue.set_focus(focus, false)?)
    }

    /// Queues a normalized sharpness.
    pub fn set_sharpness(&self, sharpness: f32) -> Result<(), GrabberError> {
        Ok(self.queue.set_sharpness(sharpness, false)?)
    }

    /// Queues an arbitrary command.
    pub fn submit(&self, command: Command, block_until_complete: bool) -> Result<(), GrabberError> {
        Ok(self.queue.add_action(command, block_until_complete)?)
    }

    /// Queues every setting in `config`. The device must be open by the
    /// time the commands run.
    pub fn apply_config(&self, config: &GrabberConfig) -> Result<(), GrabberError> {
        config
            .validate()
            .map_err(|e| GrabberError::InvalidArgument(e.to_string()))?;

        self.queue.set_binning(config.binning, false)?;
        if let Some(roi) = config.roi {
            self.queue.set_roi(roi, false)?;
        }
        self.queue.set_trigger_mode(config.trigger, false)?;
        self.queue.set_gpo_mode(config.gpo, false)?;
        if let Some(exposure) = config.exposure() {
            self.queue.set_exposure(exposure, false)?;
        }
        if let Some(gain) = config.gain {
            self.queue.set_gain(gain, false)?;
        }
        Ok(())
    }

    /// Waits until every queued command has executed.
    pub fn block_until_idle(&self) -> Result<(), GrabberError> {
        Ok(self.queue.block_until_action_queue_empty()?)
    }

    /// Registers a callback fired on the worker thread for every frame.
    ///
    /// Register listeners before capture starts to see every frame. A
    /// listener must not make blocking grabber calls, but may register
    /// further listeners.
    pub fn add_frame_listener<F>(&self, listener: F)
    where
        F: Fn(&Arc<Frame>) + Send + Sync + 'static,
    {
        self.queue.add_frame_listener(Box::new(listener));
    }

    /// Registers a callback fired on the worker thread for every failed
    /// command.
    pub fn add_error_listener<F>(&self, listener: F)
    where
        F: Fn(&CommandFailure) + Send + Sync + 'static,
    {
        self.queue.add_error_listener(Box::new(listener));
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.queue.state()
    }

    /// True while the device is open, capturing or not.
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// True while free-run capture is active.
    pub fn is_capturing(&self) -> bool {
        self.state() == DeviceState::Capturing
    }

    /// Returns the worker counters.
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }
}

impl Drop for Grabber {
    fn drop(&mut self) {
        self.queue.begin_deleting();
        self.queue.join();
        tracing::debug!("grabber dropped");
    }
}
