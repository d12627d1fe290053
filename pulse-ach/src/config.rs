//! Service configuration
//!
//! Command line (with environment fallbacks) overrides the TOML file, which
//! overrides compiled defaults.

use clap::Parser;
use pulse_common::config::{default_config_path, AchievementSettings, TomlConfig};
use pulse_common::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for pulse-ach
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "pulse-ach")]
#[command(about = "Achievement and notification service for Pulse")]
#[command(version)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PULSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "PULSE_DATABASE")]
    pub database: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "PULSE_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PULSE_PORT")]
    pub port: Option<u16>,
}

impl Args {
    /// Config file to read: `--config`, else the platform default
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(default_config_path)
    }
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub achievements: AchievementSettings,
}

impl ServiceConfig {
    /// Load the TOML file named by `args` and apply overrides
    pub fn resolve(args: &Args) -> Result<Self> {
        let file = match args.config_path() {
            Some(path) => TomlConfig::load(&path)?,
            None => TomlConfig::default(),
        };
        Ok(Self::merge(args, file))
    }

    /// Apply command-line overrides on top of file values
    pub fn merge(args: &Args, file: TomlConfig) -> Self {
        Self {
            database_path: args.database.clone().unwrap_or(file.database_path),
            host: args.host.clone().unwrap_or(file.host),
            port: args.port.unwrap_or(file.port),
            log_level: file.logging.level,
            achievements: file.achievements,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.achievements.sweep_interval_secs)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_millis(self.achievements.reconcile_timeout_ms)
    }
}
