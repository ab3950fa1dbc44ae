//! Application settings

use crate::core::device::DeviceSettings;
use crate::core::experiment::{ExperimentSettings, Hand, HandConfig};
use crate::core::state_machine::RetryPolicy;
use crate::core::tap::CycleLimits;
use crate::core::transport::SerialSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No platform config directory
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Read or write failed
    #[error("{path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`AppConfig`]
    #[error("{path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// Serialization failed
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial link settings, shared by every hand
    pub serial: SerialSettings,
    /// Device parameters pushed at session start
    pub device: DeviceSettings,
    /// Retry and deadline bounds
    pub retry: RetryConfig,
    /// Device per hand
    pub hands: Vec<HandConfig>,
    /// Experiment defaults
    pub experiment: ExperimentSettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            device: DeviceSettings::default(),
            retry: RetryConfig::default(),
            hands: vec![
                HandConfig {
                    hand: Hand::Right,
                    port: default_port(0),
                    fingers: vec![1, 2, 3, 4, 5],
                },
                HandConfig {
                    hand: Hand::Left,
                    port: default_port(1),
                    fingers: Vec::new(),
                },
            ],
            experiment: ExperimentSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(windows)]
fn default_port(n: u8) -> String {
    format!("COM{}", 3 + 2 * n)
}

#[cfg(not(windows))]
fn default_port(n: u8) -> String {
    format!("/dev/ttyACM{}", n)
}

impl AppConfig {
    /// Load config from the default location; a missing file yields defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load config from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Session limits derived from the retry and serial settings
    pub fn cycle_limits(&self) -> CycleLimits {
        CycleLimits {
            command: self.retry.command,
            markers: self.retry.cycle,
            read_timeout: self.serial.read_timeout(),
        }
    }

    /// Assignment for `hand`, if configured
    pub fn hand(&self, hand: Hand) -> Option<&HandConfig> {
        self.hands.iter().find(|h| h.hand == hand)
    }
}

/// Retry and deadline bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Each phase of a command exchange
    pub command: RetryPolicy,
    /// Each marker wait of a tap cycle, counted in consecutive reads without progress
    pub cycle: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            command: RetryPolicy::command(),
            cycle: RetryPolicy::cycle(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Show every line the device sends
    pub print_device_messages: bool,
    /// Write a daily log file
    pub file_log: bool,
    /// Log file directory
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            print_device_messages: false,
            file_log: false,
            directory: super::log_dir(),
        }
    }
}
