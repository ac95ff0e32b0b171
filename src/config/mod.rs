//! Configuration module
//!
//! Handles loading the command-line tool's configuration. Protocol ports
//! and the response timeout are fixed and deliberately absent here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::display::DisplayMode;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Which device to talk to
    #[serde(default)]
    pub device: DeviceConfig,

    /// How read results are printed
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host name or IP address of the device
    #[serde(default = "default_remote_host")]
    pub remote_host: String,
    /// Local interface to receive replies on (default: all)
    pub bind_address: Option<String>,
}

fn default_remote_host() -> String {
    "12.12.12.7".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            remote_host: default_remote_host(),
            bind_address: None,
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub mode: DisplayMode,
    /// Use 64-bit register accesses
    #[serde(default)]
    pub wide: bool,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("ethreg/config.toml")),
            Some(PathBuf::from("./ethreg.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
