//! Device abstraction for blocking capture hardware.
//!
//! Concrete hardware bindings implement [`Device`]. The grabber never calls
//! a device directly: the device is moved onto the command queue's worker
//! thread, which is the only place its methods run.

use super::settings::{Binning, GpoMode, Roi, TriggerSettings};
use crate::capture::Frame;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during device operations.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// The operation needs an open device.
    #[error("device is not open")]
    NotOpen,
    /// A frame was requested outside free-run capture.
    #[error("device is not streaming")]
    NotStreaming,
    /// The device lacks this control.
    #[error("operation not supported by this device: {0}")]
    Unsupported(&'static str),
    /// The device refused to open.
    #[error("failed to open device: {0}")]
    OpenFailed(String),
    /// Any other failure reported by the hardware.
    #[error("hardware error: {0}")]
    Hardware(String),
}

/// Concurrency strategy a device needs from the grabber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Every call blocks until the hardware finishes; calls must be
    /// serialized on a dedicated thread.
    Blocking,
    /// The device cannot be driven by this grabber.
    NotImplemented,
}

/// Trait for capture device implementations.
///
/// Every method blocks until the hardware call finishes. Implementations
/// only need `Send`: the grabber guarantees a single caller at a time.
///
/// Optional controls default to [`DeviceError::Unsupported`].
pub trait Device: Send {
    /// Reports how the device must be driven.
    fn kind(&self) -> DeviceKind {
        DeviceKind::Blocking
    }

    /// Opens the device with the given index.
    fn open(&mut self, device_id: u32) -> Result<(), DeviceError>;

    /// Closes the device and releases its resources.
    fn close(&mut self) -> Result<(), DeviceError>;

    /// Starts continuous (free-run) capture.
    fn start_free_run(&mut self) -> Result<(), DeviceError>;

    /// Stops continuous capture.
    fn stop_free_run(&mut self) -> Result<(), DeviceError>;

    /// Pulls one frame while free-run capture is active.
    ///
    /// Blocks for at most a device-defined interval and returns `Ok(None)`
    /// when no frame became ready in that time.
    fn get_frame(&mut self) -> Result<Option<Frame>, DeviceError>;

    /// Sets pixel binning.
    fn set_binning(&mut self, binning: Binning) -> Result<(), DeviceError>;

    /// Restricts capture to a region of interest.
    fn set_roi(&mut self, roi: Roi) -> Result<(), DeviceError>;

    /// Sets the trigger mode and signal.
    fn set_trigger_mode(&mut self, trigger: TriggerSettings) -> Result<(), DeviceError>;

    /// Sets the general purpose output behaviour.
    fn set_gpo_mode(&mut self, mode: GpoMode) -> Result<(), DeviceError>;

    /// Sets a fixed exposure time.
    fn set_exposure(&mut self, _exposure: Duration) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("exposure"))
    }

    /// Sets normalized gain (0.0 to 1.0).
    fn set_gain(&mut self, _gain: f32) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("gain"))
    }

    /// Sets normalized focus (0.0 to 1.0).
    fn set_focus(&mut self, _focus: f32) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("focus"))
    }

    /// Sets normalized sharpness (0.0 to 1.0).
    fn set_sharpness(&mut self, _sharpness: f32) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("sharpness"))
    }

    /// Captures exactly one frame outside free-run mode.
    fn single_shot(&mut self) -> Result<Frame, DeviceError> {
        Err(DeviceError::Unsupported("single shot"))
    }
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn kind(&self) -> DeviceKind {
        (**self).kind()
    }
    fn open(&mut self, device_id: u32) -> Result<(), DeviceError> {
        (**self).open(device_id)
    }
    fn close(&mut self) -> Result<(), DeviceError> {
        (**self).close()
    }
    fn start_free_run(&mut self) -> Result<(), DeviceError> {
        (**self).start_free_run()
    }
    fn stop_free_run(&mut self) -> Result<(), DeviceError> {
        (**self).stop_free_run()
    }
    fn get_frame(&mut self) -> Result<Option<Frame>, DeviceError> {
        (**self).get_frame()
    }
    fn set_binning(&mut self, binning: Binning) -> Result<(), DeviceError> {
        (**self).set_binning(binning)
    }
    fn set_roi(&mut self, roi: Roi) -> Result<(), DeviceError> {
        (**self).set_roi(roi)
    }
    fn set_trigger_mode(&mut self, trigger: TriggerSettings) -> Result<(), DeviceError> {
        (**self).set_trigger_mode(trigger)
    }
    fn set_gpo_mode(&mut self, mode: GpoMode) -> Result<(), DeviceError> {
        (**self).set_gpo_mode(mode)
    }
    fn set_exposure(&mut self, exposure: Duration) -> Result<(), DeviceError> {
        (**self).set_exposure(exposure)
    }
    fn set_gain(&mut self, gain: f32) -> Result<(), DeviceError> {
        (**self).set_gain(gain)
    }
    fn set_focus(&mut self, focus: f32) -> Result<(), DeviceError> {
        (**self).set_focus(focus)
    }
    fn set_sharpness(&mut self, sharpness: f32) -> Result<(), DeviceError> {
        (**self).set_sharpness(sharpness)
    }
    fn single_shot(&mut self) -> Result<Frame, DeviceError> {
        (**self).single_shot()
    }
}
