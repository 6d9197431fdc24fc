//! Configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation of analysis parameters
//!
//! The analysis engine itself never reads this global state: the binary resolves a
//! [`Config`] once and hands the relevant sections to [`crate::TicketAnalyzer`].

use crate::burst::ConvoySettings;
use crate::models::{ShiftBands, ValidityBounds};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,

    /// Record validity bounds, in seconds
    pub validity: ValidityBounds,

    /// Start hours of shifts A, B and C
    pub shifts: ShiftBands,

    /// Burst detection parameters
    pub convoy: ConvoySettings,

    pub limits: LimitsConfig,

    pub dwell: DwellConfig,

    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Widest analysis window accepted, in days.
    pub max_window_days: i64,
    /// Heatmap row cap; older dates are dropped beyond it.
    pub max_heatmap_days: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellConfig {
    pub target_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "ERROR".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_window_days: 370,
            max_heatmap_days: 120,
        }
    }
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self { target_minutes: 15 }
    }
}

impl DwellConfig {
    pub fn target_seconds(&self) -> i64 {
        self.target_minutes * 60
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("logs"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            validity: ValidityBounds::default(),
            shifts: ShiftBands::default(),
            convoy: ConvoySettings::default(),
            limits: LimitsConfig::default(),
            dwell: DwellConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Files probed, in order, when no explicit config path is given.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("ticket-analytics.toml"),
        PathBuf::from(".ticket-analytics.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("ticket-analytics").join("config.toml"));
    }
    paths
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let file = default_config_paths().into_iter().find(|path| path.exists());
        Self::load_layered(file.as_deref())
    }

    /// Defaults, then `file` if given, then environment overrides. The result is
    /// validated.
    pub fn load_layered(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => {
                info!(config_file = %path.display(), "Loading configuration from file");
                Self::load_from_file(path)?
            }
            None => Config::default(),
        };

        config.apply_env_overrides()?;
        config.validate().context("Invalid configuration")?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        if let Ok(val) = env::var("TICKET_ANALYTICS_MIN_SERVICE_SECONDS") {
            self.validity.min_service_seconds = val
                .parse()
                .context("Invalid TICKET_ANALYTICS_MIN_SERVICE_SECONDS")?;
        }
        if let Ok(val) = env::var("TICKET_ANALYTICS_MAX_SERVICE_SECONDS") {
            self.validity.max_service_seconds = val
                .parse()
                .context("Invalid TICKET_ANALYTICS_MAX_SERVICE_SECONDS")?;
        }
        if let Ok(val) = env::var("TICKET_ANALYTICS_MAX_WAIT_SECONDS") {
            self.validity.max_wait_seconds = val
                .parse()
                .context("Invalid TICKET_ANALYTICS_MAX_WAIT_SECONDS")?;
        }

        if let Ok(val) = env::var("TICKET_ANALYTICS_BUCKET_MINUTES") {
            self.convoy.bucket_minutes = val
                .parse()
                .context("Invalid TICKET_ANALYTICS_BUCKET_MINUTES")?;
        }
        if let Ok(val) = env::var("TICKET_ANALYTICS_TOP_K") {
            self.convoy.top_k = val.parse().context("Invalid TICKET_ANALYTICS_TOP_K")?;
        }
        if let Ok(val) = env::var("TICKET_ANALYTICS_SERVICE_MINUTES") {
            self.convoy.service_minutes = val
                .parse()
                .context("Invalid TICKET_ANALYTICS_SERVICE_MINUTES")?;
        }

        if let Ok(val) = env::var("TICKET_ANALYTICS_MAX_WINDOW_DAYS") {
            self.limits.max_window_days = val
                .parse()
                .context("Invalid TICKET_ANALYTICS_MAX_WINDOW_DAYS")?;
        }
        if let Ok(val) = env::var("TICKET_ANALYTICS_MAX_HEATMAP_DAYS") {
            self.limits.max_heatmap_days = val
                .parse()
                .context("Invalid TICKET_ANALYTICS_MAX_HEATMAP_DAYS")?;
        }
        if let Ok(val) = env::var("TICKET_ANALYTICS_DWELL_TARGET_MINUTES") {
            self.dwell.target_minutes = val
                .parse()
                .context("Invalid TICKET_ANALYTICS_DWELL_TARGET_MINUTES")?;
        }

        if let Ok(val) = env::var("TICKET_ANALYTICS_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let v = &self.validity;
        if v.min_service_seconds < 0 || v.min_service_seconds > v.max_service_seconds {
            return Err(anyhow::anyhow!(
                "Service bounds must satisfy 0 <= min <= max, got {}..{}",
                v.min_service_seconds,
                v.max_service_seconds
            ));
        }
        if v.max_wait_seconds < 0 {
            return Err(anyhow::anyhow!("Maximum wait cannot be negative"));
        }

        self.shifts.validate()?;
        self.convoy.validate()?;

        if self.convoy.top_k == 0 {
            warn!("convoy.top_k is 0, no bursts will be listed");
        }

        if self.limits.max_window_days < 1 {
            return Err(anyhow::anyhow!("Window cap must be at least one day"));
        }
        if self.limits.max_heatmap_days == 0 {
            return Err(anyhow::anyhow!("Heatmap cap must be at least one day"));
        }

        if self.dwell.target_minutes <= 0 {
            return Err(anyhow::anyhow!(
                "Dwell target must be positive, got {} minutes",
                self.dwell.target_minutes
            ));
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance, loading it on first use. A broken
/// configuration is an error and is not cached.
pub fn get_config() -> Result<&'static Config> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::load()?;
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "ERROR");
        assert_eq!(config.validity.min_service_seconds, 60);
        assert_eq!(config.convoy.bucket_minutes, 15);
        assert_eq!(config.limits.max_window_days, 370);
        assert_eq!(config.dwell.target_seconds(), 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        env::set_var("TICKET_ANALYTICS_TOP_K", "25");
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.convoy.top_k, 25);
        env::remove_var("TICKET_ANALYTICS_TOP_K");
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.convoy.bucket_minutes = 7;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.validity.min_service_seconds = 2000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.shifts.c_start_hour = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("[convoy]\nbucket_minutes = 30\n").unwrap();
        assert_eq!(config.convoy.bucket_minutes, 30);
        assert_eq!(config.convoy.top_k, 10);
        assert_eq!(config.shifts, ShiftBands::default());
    }
}
