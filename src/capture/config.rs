//! Grabber configuration.
//!
//! Settings here are applied to the device through the command queue
//! right after it opens, so a configuration file describes the state a
//! capture session starts from.

use crate::device::{Binning, GpoMode, MockConfig, Roi, TriggerSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for one grabber session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabberConfig {
    /// Device index passed to `open`.
    pub device_id: u32,
    /// Binning factors.
    pub binning: Binning,
    /// Optional region of interest (full sensor when absent).
    pub roi: Option<Roi>,
    /// Trigger mode and signal used when capture starts.
    pub trigger: TriggerSettings,
    /// General purpose output behaviour.
    pub gpo: GpoMode,
    /// Fixed exposure time in microseconds (device default when absent).
    pub exposure_us: Option<u64>,
    /// Normalized gain (device default when absent).
    pub gain: Option<f32>,
    /// Default timeout for fresh-frame requests, in seconds.
    pub fresh_frame_timeout_secs: f32,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            binning: Binning::default(),
            roi: None,
            trigger: TriggerSettings::default(),
            gpo: GpoMode::default(),
            exposure_us: None,
            gain: None,
            fresh_frame_timeout_secs: 5.0,
        }
    }
}

impl GrabberConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.binning.validate()?;
        if let Some(roi) = &self.roi {
            roi.validate()?;
        }
        if let Some(gain) = self.gain {
            crate::device::settings::validate_unit("gain", gain)?;
        }
        if self.exposure_us == Some(0) {
            return Err(ConfigError::OutOfRange {
                name: "exposure_us",
                value: 0.0,
            });
        }
        let timeout = self.fresh_frame_timeout_secs;
        if timeout <= 0.0 || Duration::try_from_secs_f32(timeout).is_err() {
            return Err(ConfigError::InvalidTimeout(timeout));
        }
        Ok(())
    }

    /// Returns the fresh-frame timeout as a `Duration`.
    ///
    /// Values too large for a `Duration` saturate; negative or NaN values
    /// give zero.
    pub fn fresh_frame_timeout(&self) -> Duration {
        let secs = self.fresh_frame_timeout_secs;
        Duration::try_from_secs_f32(secs).unwrap_or(if secs > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        })
    }

    /// Returns the exposure as a `Duration`, if configured.
    pub fn exposure(&self) -> Option<Duration> {
        self.exposure_us.map(Duration::from_micros)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Binning factor of zero.
    #[error("invalid binning {x}x{y} (factors must be at least 1)")]
    InvalidBinning {
        /// Horizontal factor.
        x: u32,
        /// Vertical factor.
        y: u32,
    },
    /// Empty region of interest.
    #[error("invalid region of interest {0}")]
    InvalidRoi(Roi),
    /// A setting outside its allowed range.
    #[error("{name} out of range: {value}")]
    OutOfRange {
        /// Setting name.
        name: &'static str,
        /// Rejected value.
        value: f32,
    },
    /// Fresh-frame timeout that is not positive or does not fit a `Duration`.
    #[error("invalid fresh frame timeout: {0}s")]
    InvalidTimeout(f32),
    /// Zero sensor width or height.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Mock frame rate outside 1-1000 fps.
    #[error("invalid frame rate (must be 1-1000 fps)")]
    InvalidFrameRate,
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Session settings applied after open.
    #[serde(default)]
    pub grabber: GrabberConfig,
    /// Mock sensor used by the demo binary.
    #[serde(default)]
    pub mock: MockConfig,
    /// Demo loop and metrics settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration for the demo binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Number of fresh frames to observe before stopping.
    pub frame_count: u32,
    /// Consumer update ticks per second.
    pub update_hz: u32,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frame_count: 100,
            update_hz: 60,
            metrics_port: 9090,
        }
    }
}

impl OutputConfig {
    /// Returns the period between consumer update ticks.
    pub fn update_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.update_hz.max(1)))
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.grabber.validate()?;
        config.mock.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{TriggerMode, TriggerSignal};

    #[test]
    fn test_default_config_valid() {
        let config = GrabberConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fresh_frame_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_binning_invalid() {
        let config = GrabberConfig {
            binning: Binning::new(0, 1),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBinning { .. })
        ));
    }

    #[test]
    fn test_negative_timeout_invalid() {
        let config = GrabberConfig {
            fresh_frame_timeout_secs: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_unrepresentable_timeout_invalid() {
        for secs in [1e30, f32::INFINITY, f32::NAN] {
            let config = GrabberConfig {
                fresh_frame_timeout_secs: secs,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidTimeout(_))
            ));
        }

        let huge = GrabberConfig {
            fresh_frame_timeout_secs: 1e30,
            ..Default::default()
        };
        assert_eq!(huge.fresh_frame_timeout(), Duration::MAX);
    }

    #[test]
    fn test_parse_file_config() {
        let text = r#"
            [grabber]
            device_id = 2
            binning = { x = 2, y = 2 }
            roi = { x = 0, y = 0, width = 320, height = 240 }
            trigger = { mode = "software", signal = "falling_edge" }
            fresh_frame_timeout_secs = 1.5

            [mock]
            width = 320
            height = 240
            fps = 15.0

            [output]
            frame_count = 10
        "#;

        let config = FileConfig::from_toml(text).unwrap();
        assert_eq!(config.grabber.device_id, 2);
        assert_eq!(config.grabber.binning, Binning::new(2, 2));
        assert_eq!(config.grabber.roi, Some(Roi::new(0, 0, 320, 240)));
        assert_eq!(config.grabber.trigger.mode, TriggerMode::Software);
        assert_eq!(config.grabber.trigger.signal, TriggerSignal::FallingEdge);
        assert_eq!(config.mock.width, 320);
        assert_eq!(config.output.frame_count, 10);
        assert_eq!(config.output.update_hz, 60);
    }

    #[test]
    fn test_parse_rejects_invalid_roi() {
        let text = "[grabber]\nroi = { x = 0, y = 0, width = 0, height = 10 }\n";
        assert!(matches!(
            FileConfig::from_toml(text),
            Err(ConfigError::InvalidRoi(_))
        ));
    }
}
