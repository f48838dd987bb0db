//! Configuration file support for inbandmgrd.
//!
//! Loads and validates the daemon configuration from a TOML file.
//! Default location: /etc/sonic/inbandmgrd.toml

use crate::error::{InbandError, Result};
use serde::{Deserialize, Serialize};
use sonic_types::{Link, SwitchId};
use std::fs;
use std::path::Path;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/inbandmgrd.toml";

/// TCP port the controller listens on for switch connections.
pub const DEFAULT_CONTROL_PORT: u16 = 6633;

/// Priority of the remote → controller rule.
pub const DEFAULT_UP_PATH_PRIORITY: u16 = 60000;

/// Priority of the controller → remote rules.
pub const DEFAULT_DOWN_PATH_PRIORITY: u16 = 61000;

/// Application identity and packet-processor registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name; owns every rule this daemon installs
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Priority band the packet processor registers at
    #[serde(default = "default_processor_priority")]
    pub processor_priority: u32,
}

/// Bootstrap and rule policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Switch directly attached to the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_switch_id: Option<SwitchId>,

    /// Controller TCP port
    #[serde(default = "default_control_port")]
    pub control_port: u16,

    /// Priority of the up-path rule
    #[serde(default = "default_up_path_priority")]
    pub up_path_priority: u16,

    /// Priority of the down-path rules
    #[serde(default = "default_down_path_priority")]
    pub down_path_priority: u16,

    /// Drop LLDP/BSN discovery frames before classification
    #[serde(default)]
    pub ignore_discovery_frames: bool,
}

/// Static topology used by the daemon's built-in topology provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Known links, `{ src = "sw/port", dst = "sw/port" }`
    #[serde(default)]
    pub links: Vec<Link>,

    /// Also add the reverse of every configured link
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

/// Complete inbandmgrd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InbandConfig {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub topology: TopologyConfig,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_app_name() -> String {
    "org.sonic.inbandmgrd".to_string()
}

fn default_processor_priority() -> u32 {
    2
}

fn default_control_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

fn default_up_path_priority() -> u16 {
    DEFAULT_UP_PATH_PRIORITY
}

fn default_down_path_priority() -> u16 {
    DEFAULT_DOWN_PATH_PRIORITY
}

fn default_bidirectional() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            processor_priority: default_processor_priority(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            bootstrap_switch_id: None,
            control_port: default_control_port(),
            up_path_priority: default_up_path_priority(),
            down_path_priority: default_down_path_priority(),
            ignore_discovery_frames: false,
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            links: Vec::new(),
            bidirectional: default_bidirectional(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl InbandConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| InbandError::config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content).map_err(|e| {
                InbandError::config(format!("{}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Logging is not initialised yet; the log section lives in this file.
                eprintln!(
                    "inbandmgrd: Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(InbandError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| InbandError::config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.app.name.trim().is_empty() {
            return Err(InbandError::config("app.name must not be empty"));
        }

        if self.bootstrap.control_port == 0 {
            return Err(InbandError::config("control_port must be > 0"));
        }

        if self.bootstrap.down_path_priority <= self.bootstrap.up_path_priority {
            return Err(InbandError::config(format!(
                "down_path_priority ({}) must be greater than up_path_priority ({})",
                self.bootstrap.down_path_priority, self.bootstrap.up_path_priority
            )));
        }

        Ok(())
    }
}
