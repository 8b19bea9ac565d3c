//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/focusforest/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/focusforest/` (~/.config/focusforest/)
//! - Data: `$XDG_DATA_HOME/focusforest/` (~/.local/share/focusforest/)
//! - State/Logs: `$XDG_STATE_HOME/focusforest/` (~/.local/state/focusforest/)

use crate::analytics::{BucketLayout, Overflow, StreakMode};
use crate::error::{Error, Result};
use crate::types::{MAX_DURATION_MINUTES, MIN_DURATION_MINUTES};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Longest report window, in days
pub const MAX_REPORT_DAYS: u32 = 366;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Snapshot recomputation settings
    #[serde(default)]
    pub stats: StatsConfig,

    /// Report window settings
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot recomputation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    /// How streaks are derived on every recompute
    #[serde(default)]
    pub streak_mode: StreakMode,

    /// Shortest accepted session length
    #[serde(default = "default_min_duration")]
    pub min_duration_minutes: u32,

    /// Longest accepted session length
    #[serde(default = "default_max_duration")]
    pub max_duration_minutes: u32,

    /// Attempts at saving a snapshot before giving up on version conflicts
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            streak_mode: StreakMode::default(),
            min_duration_minutes: default_min_duration(),
            max_duration_minutes: default_max_duration(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

fn default_min_duration() -> u32 {
    MIN_DURATION_MINUTES
}

fn default_max_duration() -> u32 {
    MAX_DURATION_MINUTES
}

fn default_max_conflict_retries() -> usize {
    3
}

/// Report window configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    /// Days covered by the week report (one bucket per day)
    #[serde(default = "default_week_days")]
    pub week_days: u32,

    /// Days covered by the month report
    #[serde(default = "default_month_days")]
    pub month_days: u32,

    /// Width of each month bucket in days
    #[serde(default = "default_month_bucket_days")]
    pub month_bucket_days: u32,

    /// Number of month buckets; overflow days fold into the last one
    #[serde(default = "default_month_bucket_count")]
    pub month_bucket_count: u32,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            week_days: default_week_days(),
            month_days: default_month_days(),
            month_bucket_days: default_month_bucket_days(),
            month_bucket_count: default_month_bucket_count(),
        }
    }
}

fn default_week_days() -> u32 {
    7
}

fn default_month_days() -> u32 {
    30
}

fn default_month_bucket_days() -> u32 {
    7
}

fn default_month_bucket_count() -> u32 {
    4
}

impl ReportsConfig {
    /// Layout for the daily week report.
    pub fn week_layout(&self) -> BucketLayout {
        BucketLayout {
            window_days: self.week_days,
            bucket_days: 1,
            bucket_count: self.week_days,
            overflow: Overflow::Drop,
        }
    }

    /// Layout for the weekly month report.
    pub fn month_layout(&self) -> BucketLayout {
        BucketLayout {
            window_days: self.month_days,
            bucket_days: self.month_bucket_days,
            bucket_count: self.month_bucket_count,
            overflow: Overflow::FoldIntoLast,
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        for (key, days) in [("week_days", self.week_days), ("month_days", self.month_days)] {
            if days == 0 || days > MAX_REPORT_DAYS {
                return Err(Error::Config(format!(
                    "reports.{} must lie within [1, {}], got {}",
                    key, MAX_REPORT_DAYS, days
                )));
            }
        }
        if self.month_bucket_days == 0 || self.month_bucket_count == 0 {
            return Err(Error::Config(
                "reports.month_bucket_days and reports.month_bucket_count must be at least 1"
                    .to_string(),
            ));
        }
        let covered = self.month_bucket_days.checked_mul(self.month_bucket_count);
        if covered.map_or(true, |days| days > self.month_days) {
            return Err(Error::Config(format!(
                "reports.month_days ({}) is shorter than {} buckets of {} days",
                self.month_days, self.month_bucket_count, self.month_bucket_days
            )));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        let stats = &self.stats;
        if stats.min_duration_minutes < MIN_DURATION_MINUTES
            || stats.max_duration_minutes > MAX_DURATION_MINUTES
            || stats.min_duration_minutes > stats.max_duration_minutes
        {
            return Err(Error::Config(format!(
                "stats duration bounds must lie within [{}, {}]",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }
        if stats.max_conflict_retries == 0 {
            return Err(Error::Config(
                "stats.max_conflict_retries must be at least 1".to_string(),
            ));
        }
        self.reports.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/focusforest/config.toml` (~/.config/focusforest/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("focusforest").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/focusforest/` (~/.local/share/focusforest/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("focusforest")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/focusforest/` (~/.local/state/focusforest/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("focusforest")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/focusforest/data.db` (~/.local/share/focusforest/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file written on `day`
    ///
    /// Logs rotate daily, so each day has its own file:
    /// `$XDG_STATE_HOME/focusforest/focusforest.YYYY-MM-DD.log`
    pub fn log_path(day: NaiveDate) -> PathBuf {
        Self::state_dir().join(format!("focusforest.{}.log", day.format("%Y-%m-%d")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.stats.streak_mode, StreakMode::Recompute);
        assert_eq!(config.stats.min_duration_minutes, 1);
        assert_eq!(config.stats.max_duration_minutes, 180);
        assert_eq!(config.reports.week_days, 7);
        assert_eq!(config.reports.month_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[stats]
streak_mode = "incremental"
max_duration_minutes = 90

[reports]
month_days = 28

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.stats.streak_mode, StreakMode::Incremental);
        assert_eq!(config.stats.max_duration_minutes, 90);
        assert_eq!(config.stats.max_conflict_retries, 3);
        assert_eq!(config.reports.month_days, 28);
        assert_eq!(config.reports.month_bucket_count, 4);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layouts_from_config() {
        let reports = ReportsConfig::default();
        let week = reports.week_layout();
        assert_eq!((week.window_days, week.bucket_days, week.bucket_count), (7, 1, 7));
        let month = reports.month_layout();
        assert_eq!(
            (month.window_days, month.bucket_days, month.bucket_count),
            (30, 7, 4)
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.stats.max_duration_minutes = 240;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.reports.month_days = 20;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.stats.max_conflict_retries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.reports.month_days = MAX_REPORT_DAYS + 1;
        assert!(config.validate().is_err());

        // the product would wrap around in u32
        let mut config = Config::default();
        config.reports.month_bucket_days = 65_536;
        config.reports.month_bucket_count = 65_536;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.reports.week_days = MAX_REPORT_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[reports]\nweek_days = 14\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.reports.week_days, 14);

        std::fs::write(&path, "[reports]\nmonth_bucket_count = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "[reports]\nweek_days = 4000000000\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_log_path_names_the_daily_file() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let path = Config::log_path(day);
        assert!(path.ends_with("focusforest/focusforest.2024-03-09.log"));
        assert!(path.starts_with(Config::state_dir()));
    }
}
