//! Configuration management for the OrderLog.
//!
//! This module handles the `.soup/orderlog.yaml` file. Every field has a
//! default, so a partial file (or no file) is valid.

use crate::error::{Error, Result};
use crate::orders::models::{normalize_color, DEFAULT_COLOR};
use crate::orders::undo::DEFAULT_MAX_UNDO;
use crate::orders::work_time::{TimeAccrual, WorkHours};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file path relative to the base directory.
pub const CONFIG_FILE_PATH: &str = ".soup/orderlog.yaml";

/// The working day as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkHoursConfig {
    /// Start of the working day, `HH:MM`.
    pub start: String,
    /// End of the working day, `HH:MM`.
    pub end: String,
}

impl Default for WorkHoursConfig {
    fn default() -> Self {
        Self { start: "08:00".to_string(), end: "16:30".to_string() }
    }
}

/// OrderLog settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrderLogConfig {
    /// Maximum undo depth.
    pub undo_limit: usize,

    /// The working day used for business-hours accrual.
    pub work_hours: WorkHoursConfig,

    /// Accrue in-progress and on-deck time only inside working hours.
    pub business_hours_only: bool,

    /// Color given to new items.
    pub default_color: String,

    /// Order database location. None means `~/.soup/orderlog.sqlite3`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Default for OrderLogConfig {
    fn default() -> Self {
        Self {
            undo_limit: DEFAULT_MAX_UNDO,
            work_hours: WorkHoursConfig::default(),
            business_hours_only: false,
            default_color: DEFAULT_COLOR.to_string(),
            database_path: None,
        }
    }
}

impl OrderLogConfig {
    /// Load config from the current directory, returning None if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(Path::new("."))
    }

    /// Load config from a specific base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or fails
    /// validation.
    pub fn load_from(base_dir: &Path) -> Result<Option<Self>> {
        let config_path = Self::config_path(base_dir);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Save config to a specific base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, base_dir: &Path) -> Result<()> {
        let config_path = Self::config_path(base_dir);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path for a base directory.
    pub fn config_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE_PATH)
    }

    /// Check values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero undo limit, an unparseable color or an
    /// invalid working day.
    pub fn validate(&self) -> Result<()> {
        if self.undo_limit == 0 {
            return Err(Error::Config("undo_limit must be at least 1".to_string()));
        }
        let color = normalize_color(&self.default_color);
        if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Config(format!("invalid default_color: {}", self.default_color)));
        }
        self.work_hours()?;
        Ok(())
    }

    /// The configured working day.
    ///
    /// # Errors
    ///
    /// Returns an error if either time is malformed or start is not before end.
    pub fn work_hours(&self) -> Result<WorkHours> {
        WorkHours::parse(&self.work_hours.start, &self.work_hours.end)
    }

    /// The accrual policy implied by `business_hours_only`.
    ///
    /// # Errors
    ///
    /// Returns an error if business hours are enabled and the working day is
    /// invalid.
    pub fn time_accrual(&self) -> Result<TimeAccrual> {
        if self.business_hours_only {
            Ok(TimeAccrual::WorkHours(self.work_hours()?))
        } else {
            Ok(TimeAccrual::WallClock)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = OrderLogConfig::default();
        assert_eq!(config.undo_limit, 50);
        assert!(!config.business_hours_only);
        assert_eq!(config.default_color, "#FFFFFF");
        assert!(config.database_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(OrderLogConfig::load_from(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = TempDir::new().unwrap();
        let config = OrderLogConfig {
            undo_limit: 20,
            business_hours_only: true,
            database_path: Some(PathBuf::from("/tmp/orders.db")),
            ..Default::default()
        };
        config.save_to(dir.path()).unwrap();

        let loaded = OrderLogConfig::load_from(dir.path()).unwrap().unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = OrderLogConfig::config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "work_hours:\n  start: \"07:30\"\n").unwrap();

        let loaded = OrderLogConfig::load_from(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.undo_limit, 50);
        assert_eq!(loaded.work_hours.start, "07:30");
        assert_eq!(loaded.work_hours.end, "16:30");
    }

    #[test]
    fn test_config_rejects_zero_undo_limit() {
        let config = OrderLogConfig { undo_limit: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_rejects_bad_color() {
        let config = OrderLogConfig { default_color: "#XYZ".to_string(), ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_rejects_inverted_work_hours() {
        let config = OrderLogConfig {
            work_hours: WorkHoursConfig { start: "17:00".to_string(), end: "08:00".to_string() },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_time_accrual() {
        let wall = OrderLogConfig::default();
        assert_eq!(wall.time_accrual().unwrap(), TimeAccrual::WallClock);

        let business = OrderLogConfig { business_hours_only: true, ..Default::default() };
        let TimeAccrual::WorkHours(hours) = business.time_accrual().unwrap() else {
            panic!("expected work hours accrual");
        };
        assert_eq!(hours.start(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }

    #[test]
    fn test_config_yaml_format() {
        let dir = TempDir::new().unwrap();
        OrderLogConfig::default().save_to(dir.path()).unwrap();
        let content = std::fs::read_to_string(dir.path().join(CONFIG_FILE_PATH)).unwrap();
        assert!(content.contains("undo_limit: 50"));
        assert!(content.contains("business_hours_only: false"));
        assert!(!content.contains("database_path"));
    }
}
