//! Bootstrap configuration loading
//!
//! Priority order for every value:
//! 1. Command-line argument / environment variable (applied by the binary)
//! 2. TOML config file
//! 3. Compiled default
//!
//! A missing TOML file is not an error: a warning is logged and the
//! compiled defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub achievements: AchievementSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            achievements: AchievementSettings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Achievement pipeline tuning
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AchievementSettings {
    /// Period of the safety-net reconciliation sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Soft timeout for one triggered reconciliation
    #[serde(default = "default_reconcile_timeout_ms")]
    pub reconcile_timeout_ms: u64,

    /// Bounded outbound queue per live connection
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Internal broadcast channel capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl Default for AchievementSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            reconcile_timeout_ms: default_reconcile_timeout_ms(),
            subscriber_buffer: default_subscriber_buffer(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_reconcile_timeout_ms() -> u64 {
    5000
}

fn default_subscriber_buffer() -> usize {
    32
}

fn default_event_bus_capacity() -> usize {
    1000
}

/// OS-dependent default database location
///
/// `~/.local/share/pulse/pulse.db` on Linux, the platform data dir elsewhere.
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pulse"))
        .unwrap_or_else(|| PathBuf::from("./pulse_data"))
        .join("pulse.db")
}

/// OS-dependent default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pulse").join("config.toml"))
}

impl TomlConfig {
    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration from a file
    ///
    /// A missing file yields defaults; an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file not found at {}, using compiled defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject values that would stall the pipeline
    pub fn validate(&self) -> Result<()> {
        let a = &self.achievements;
        if a.sweep_interval_secs == 0 {
            return Err(Error::Config("achievements.sweep_interval_secs must be > 0".to_string()));
        }
        if a.reconcile_timeout_ms == 0 {
            return Err(Error::Config("achievements.reconcile_timeout_ms must be > 0".to_string()));
        }
        if a.subscriber_buffer == 0 || a.event_bus_capacity == 0 {
            return Err(Error::Config("channel capacities must be > 0".to_string()));
        }
        Ok(())
    }
}
