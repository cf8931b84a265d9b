//! Commands executed by the queue's worker thread.

use crate::capture::ConfigError;
use crate::device::settings::validate_unit;
use crate::device::{Binning, GpoMode, Roi, TriggerSettings};
use std::time::Duration;

/// One control operation destined for the device.
///
/// Each variant carries exactly the payload its operation needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open the device with the given index.
    Open {
        /// Device index.
        device_id: u32,
    },
    /// Close the device, stopping free-run first if needed.
    Close,
    /// Start continuous capture.
    StartFreeRun,
    /// Stop continuous capture.
    StopFreeRun,
    /// Capture exactly one frame and publish it.
    SingleShot,
    /// Set binning factors.
    SetBinning(Binning),
    /// Set the region of interest.
    SetRoi(Roi),
    /// Set trigger mode and signal.
    SetTriggerSettings(TriggerSettings),
    /// Set the general purpose output mode.
    SetGpoMode(GpoMode),
    /// Set a fixed exposure time.
    SetExposure(Duration),
    /// Set normalized gain.
    SetGain(f32),
    /// Set normalized focus.
    SetFocus(f32),
    /// Set normalized sharpness.
    SetSharpness(f32),
}

impl Command {
    /// Short name used in logs and failure reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Close => "close",
            Self::StartFreeRun => "start_free_run",
            Self::StopFreeRun => "stop_free_run",
            Self::SingleShot => "single_shot",
            Self::SetBinning(_) => "set_binning",
            Self::SetRoi(_) => "set_roi",
            Self::SetTriggerSettings(_) => "set_trigger_settings",
            Self::SetGpoMode(_) => "set_gpo_mode",
            Self::SetExposure(_) => "set_exposure",
            Self::SetGain(_) => "set_gain",
            Self::SetFocus(_) => "set_focus",
            Self::SetSharpness(_) => "set_sharpness",
        }
    }

    /// Returns true if the command can only run against an open device.
    pub fn requires_open(&self) -> bool {
        !matches!(self, Self::Open { .. } | Self::Close)
    }

    /// Checks the payload before the command is queued.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::SetBinning(binning) => binning.validate(),
            Self::SetRoi(roi) => roi.validate(),
            Self::SetExposure(exposure) if exposure.is_zero() => Err(ConfigError::OutOfRange {
                name: "exposure",
                value: 0.0,
            }),
            Self::SetGain(value) => validate_unit("gain", *value),
            Self::SetFocus(value) => validate_unit("focus", *value),
            Self::SetSharpness(value) => validate_unit("sharpness", *value),
            _ => Ok(()),
        }
    }
}
