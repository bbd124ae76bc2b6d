//! Configuration file handling.
//!
//! Settings live in an INI file at `<config dir>/sitewatch/config.ini`:
//!
//! ```text
//! [geofence]
//! dwell_time_secs = 60
//! check_interval_secs = 10
//! enable_notifications = true
//! notify_on_exit = false
//!
//! [position]
//! high_accuracy = true
//! timeout_ms = 10000
//! maximum_age_ms = 5000
//!
//! [sites]
//! radius_m = 100
//! dwell_time_secs = 300
//!
//! [logging]
//! level = info
//! file = /var/log/sitewatch.log
//! ```
//!
//! Missing keys fall back to their defaults; a missing file is the same as an
//! empty one. Every setting is addressable as `section.key` via [`ConfigKey`].

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::geofence::{GeofenceConfig, WatchOptions, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::site::{DEFAULT_SITE_DWELL_TIME, SITE_RADIUS_M};

/// Directory name under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "sitewatch";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Log levels accepted in `logging.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Errors reading or writing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `[geofence]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceSettings {
    pub dwell_time_secs: u64,
    pub check_interval_secs: u64,
    pub enable_notifications: bool,
    pub notify_on_exit: bool,
}

impl Default for GeofenceSettings {
    fn default() -> Self {
        let defaults = GeofenceConfig::default();
        Self {
            dwell_time_secs: defaults.dwell_time.as_secs(),
            check_interval_secs: defaults.check_interval.as_secs(),
            enable_notifications: defaults.enable_notifications,
            notify_on_exit: defaults.notify_on_exit,
        }
    }
}

/// `[position]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSettings {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl Default for PositionSettings {
    fn default() -> Self {
        let defaults = WatchOptions::default();
        Self {
            high_accuracy: defaults.enable_high_accuracy,
            timeout_ms: defaults.timeout.as_millis() as u64,
            maximum_age_ms: defaults.maximum_age.as_millis() as u64,
        }
    }
}

/// `[sites]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSettings {
    pub radius_m: f64,
    pub dwell_time_secs: u64,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            radius_m: SITE_RADIUS_M,
            dwell_time_secs: DEFAULT_SITE_DWELL_TIME.as_secs(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub geofence: GeofenceSettings,
    pub position: PositionSettings,
    pub sites: SiteSettings,
    pub logging: LoggingSettings,
}

/// Location of the config file for the current user.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

impl ConfigFile {
    /// Load the user's config file, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a config file from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Save to the user's config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }

        ini.write_to_file(path).map_err(write_error)?;
        debug!(path = %path.display(), "Saved config file");
        Ok(())
    }

    /// Engine configuration from the `[geofence]` and `[position]` sections.
    pub fn geofence_config(&self) -> GeofenceConfig {
        GeofenceConfig {
            dwell_time: Duration::from_secs(self.geofence.dwell_time_secs),
            check_interval: Duration::from_secs(self.geofence.check_interval_secs),
            enable_notifications: self.geofence.enable_notifications,
            notify_on_exit: self.geofence.notify_on_exit,
            watch: self.watch_options(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Engine configuration for site monitoring: the site dwell time replaces
    /// the generic one.
    pub fn site_geofence_config(&self) -> GeofenceConfig {
        self.geofence_config()
            .with_dwell_time(Duration::from_secs(self.sites.dwell_time_secs))
    }

    /// Position watch options from the `[position]` section.
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            enable_high_accuracy: self.position.high_accuracy,
            timeout: Duration::from_millis(self.position.timeout_ms),
            maximum_age: Duration::from_millis(self.position.maximum_age_ms),
            ..WatchOptions::default()
        }
    }
}

/// Every configurable setting, addressable as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    GeofenceDwellTimeSecs,
    GeofenceCheckIntervalSecs,
    GeofenceEnableNotifications,
    GeofenceNotifyOnExit,
    PositionHighAccuracy,
    PositionTimeoutMs,
    PositionMaximumAgeMs,
    SitesRadiusM,
    SitesDwellTimeSecs,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// All keys, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::GeofenceDwellTimeSecs,
            ConfigKey::GeofenceCheckIntervalSecs,
            ConfigKey::GeofenceEnableNotifications,
            ConfigKey::GeofenceNotifyOnExit,
            ConfigKey::PositionHighAccuracy,
            ConfigKey::PositionTimeoutMs,
            ConfigKey::PositionMaximumAgeMs,
            ConfigKey::SitesRadiusM,
            ConfigKey::SitesDwellTimeSecs,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingFile,
        ]
    }

    /// Section the key lives in.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::GeofenceDwellTimeSecs
            | ConfigKey::GeofenceCheckIntervalSecs
            | ConfigKey::GeofenceEnableNotifications
            | ConfigKey::GeofenceNotifyOnExit => "geofence",
            ConfigKey::PositionHighAccuracy
            | ConfigKey::PositionTimeoutMs
            | ConfigKey::PositionMaximumAgeMs => "position",
            ConfigKey::SitesRadiusM | ConfigKey::SitesDwellTimeSecs => "sites",
            ConfigKey::LoggingLevel | ConfigKey::LoggingFile => "logging",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::GeofenceDwellTimeSecs | ConfigKey::SitesDwellTimeSecs => "dwell_time_secs",
            ConfigKey::GeofenceCheckIntervalSecs => "check_interval_secs",
            ConfigKey::GeofenceEnableNotifications => "enable_notifications",
            ConfigKey::GeofenceNotifyOnExit => "notify_on_exit",
            ConfigKey::PositionHighAccuracy => "high_accuracy",
            ConfigKey::PositionTimeoutMs => "timeout_ms",
            ConfigKey::PositionMaximumAgeMs => "maximum_age_ms",
            ConfigKey::SitesRadiusM => "radius_m",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingFile => "file",
        }
    }

    /// Unit suffix for numeric settings.
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            ConfigKey::GeofenceDwellTimeSecs
            | ConfigKey::GeofenceCheckIntervalSecs
            | ConfigKey::SitesDwellTimeSecs => Some("s"),
            ConfigKey::PositionTimeoutMs | ConfigKey::PositionMaximumAgeMs => Some("ms"),
            ConfigKey::SitesRadiusM => Some("m"),
            _ => None,
        }
    }

    /// One-line description shown by `config list`.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigKey::GeofenceDwellTimeSecs => "time inside a region before a dwell event",
            ConfigKey::GeofenceCheckIntervalSecs => "position update interval hint",
            ConfigKey::GeofenceEnableNotifications => "send arrival notifications",
            ConfigKey::GeofenceNotifyOnExit => "also notify when leaving a region",
            ConfigKey::PositionHighAccuracy => "request GPS-grade fixes",
            ConfigKey::PositionTimeoutMs => "wait for a fix before reporting an error",
            ConfigKey::PositionMaximumAgeMs => "oldest cached fix accepted",
            ConfigKey::SitesRadiusM => "geofence radius around each site",
            ConfigKey::SitesDwellTimeSecs => "time at a site before the visit reminder",
            ConfigKey::LoggingLevel => "trace, debug, info, warn or error",
            ConfigKey::LoggingFile => "also write logs to this file",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string. Empty if unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::GeofenceDwellTimeSecs => config.geofence.dwell_time_secs.to_string(),
            ConfigKey::GeofenceCheckIntervalSecs => {
                config.geofence.check_interval_secs.to_string()
            }
            ConfigKey::GeofenceEnableNotifications => {
                config.geofence.enable_notifications.to_string()
            }
            ConfigKey::GeofenceNotifyOnExit => config.geofence.notify_on_exit.to_string(),
            ConfigKey::PositionHighAccuracy => config.position.high_accuracy.to_string(),
            ConfigKey::PositionTimeoutMs => config.position.timeout_ms.to_string(),
            ConfigKey::PositionMaximumAgeMs => config.position.maximum_age_ms.to_string(),
            ConfigKey::SitesRadiusM => config.sites.radius_m.to_string(),
            ConfigKey::SitesDwellTimeSecs => config.sites.dwell_time_secs.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse and store a value.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::GeofenceDwellTimeSecs => {
                config.geofence.dwell_time_secs = self.parse_u64(value)?
            }
            ConfigKey::GeofenceCheckIntervalSecs => {
                config.geofence.check_interval_secs = self.parse_u64(value)?
            }
            ConfigKey::GeofenceEnableNotifications => {
                config.geofence.enable_notifications = self.parse_bool(value)?
            }
            ConfigKey::GeofenceNotifyOnExit => {
                config.geofence.notify_on_exit = self.parse_bool(value)?
            }
            ConfigKey::PositionHighAccuracy => {
                config.position.high_accuracy = self.parse_bool(value)?
            }
            ConfigKey::PositionTimeoutMs => config.position.timeout_ms = self.parse_u64(value)?,
            ConfigKey::PositionMaximumAgeMs => {
                config.position.maximum_age_ms = self.parse_u64(value)?
            }
            ConfigKey::SitesRadiusM => {
                let radius: f64 = value.parse().map_err(|_| self.invalid(value, "expected a number"))?;
                if !radius.is_finite() || radius <= 0.0 {
                    return Err(self.invalid(value, "radius must be a positive number of meters"));
                }
                config.sites.radius_m = radius;
            }
            ConfigKey::SitesDwellTimeSecs => config.sites.dwell_time_secs = self.parse_u64(value)?,
            ConfigKey::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(self.invalid(
                        value,
                        &format!("expected one of {}", LOG_LEVELS.join(", ")),
                    ));
                }
                config.logging.level = level;
            }
            ConfigKey::LoggingFile => {
                config.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
        }
        Ok(())
    }

    fn parse_u64(&self, value: &str) -> Result<u64, ConfigError> {
        value
            .parse()
            .map_err(|_| self.invalid(value, "expected a non-negative integer"))
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
