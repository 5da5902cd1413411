//! Driver configuration.
//!
//! Settings that belong to the operator rather than the camera: how to
//! reach the device, whether captures stay on it, and how the poll
//! loop is paced.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Device address and identity, free-text as the host presents them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Transport address, e.g. `usb:` or a network host:port.
    pub address: String,
    /// Operator-visible label for the device.
    pub label: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "usb:".to_string(),
            label: "Tethered Camera".to_string(),
        }
    }
}

/// Per-cycle acquisition behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Keep captured assets on the camera after transfer.
    pub save_on_camera: bool,
    /// Sensitivity applied at connect time.
    pub sensitivity: f64,
    /// Poll cadence for the exposure state machine.
    pub poll_period_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            save_on_camera: false,
            sensitivity: 400.0,
            poll_period_ms: 1000,
        }
    }
}

/// Configuration validation and load errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("poll period must be at least 100 ms")]
    InvalidPollPeriod,
    #[error("sensitivity must be positive")]
    InvalidSensitivity,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

impl AcquisitionConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_period_ms < 100 {
            return Err(ConfigError::InvalidPollPeriod);
        }
        if self.sensitivity <= 0.0 {
            return Err(ConfigError::InvalidSensitivity);
        }
        Ok(())
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: FileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.acquisition.validate()?;
        Ok(config)
    }
}
