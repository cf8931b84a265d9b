//! Typed payloads for device settings.
//!
//! Each setting that a command can carry has its own type here, so a
//! command's payload always matches its tag.

use crate::capture::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel binning factors along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binning {
    /// Horizontal binning factor.
    pub x: u32,
    /// Vertical binning factor.
    pub y: u32,
}

impl Binning {
    /// Creates binning factors.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Rejects zero factors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.x == 0 || self.y == 0 {
            return Err(ConfigError::InvalidBinning {
                x: self.x,
                y: self.y,
            });
        }
        Ok(())
    }
}

impl Default for Binning {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Region of interest in sensor pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Region width.
    pub width: u32,
    /// Region height.
    pub height: u32,
}

impl Roi {
    /// Creates a region of interest.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rejects empty regions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidRoi(*self));
        }
        Ok(())
    }

    /// Returns true if the region lies within a sensor of the given size.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x.saturating_add(self.width) <= width && self.y.saturating_add(self.height) <= height
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Source that triggers a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// The device paces itself (free-running).
    #[default]
    Device,
    /// First hardware trigger input.
    Gpio1,
    /// Second hardware trigger input.
    Gpio2,
    /// Triggered by a software command.
    Software,
}

/// Signal edge or level a hardware trigger responds to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSignal {
    /// Whatever the device defaults to.
    #[default]
    Default,
    /// Rising edge.
    RisingEdge,
    /// Falling edge.
    FallingEdge,
    /// Continuous capture while the line is high.
    WhilstHigh,
    /// Continuous capture while the line is low.
    WhilstLow,
}

/// Trigger mode and signal, applied together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSettings {
    /// Trigger source.
    #[serde(default)]
    pub mode: TriggerMode,
    /// Trigger signal type.
    #[serde(default)]
    pub signal: TriggerSignal,
}

impl TriggerSettings {
    /// Creates trigger settings.
    pub const fn new(mode: TriggerMode, signal: TriggerSignal) -> Self {
        Self { mode, signal }
    }
}

/// Behaviour of the general purpose output line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpoMode {
    /// Output held low.
    #[default]
    Off,
    /// Output held high.
    On,
    /// Output high while the sensor is exposing.
    OnWhilstExposing,
}

/// Checks that a normalized control value lies within `0.0..=1.0`.
pub(crate) fn validate_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange { name, value });
    }
    Ok(())
}
