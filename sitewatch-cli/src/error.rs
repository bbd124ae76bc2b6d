//! CLI error types.

use std::fmt;

use sitewatch::config::ConfigError;
use sitewatch::geofence::GeofenceError;
use sitewatch::logging::LoggingError;
use sitewatch::replay::TrackError;
use sitewatch::site::SiteError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration error.
    Config(String),

    /// Failed to initialize logging.
    Logging(LoggingError),

    /// Failed to load the site catalog.
    Sites(SiteError),

    /// Failed to load the recorded track.
    Track(TrackError),

    /// Monitoring could not be started.
    Monitoring(GeofenceError),

    /// Failed to create the Tokio runtime.
    Runtime(String),

    /// Invalid command-line input.
    InvalidInput(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Sites(e) => write!(f, "{}", e),
            CliError::Track(e) => write!(f, "{}", e),
            CliError::Monitoring(e) => write!(f, "Monitoring failed: {}", e),
            CliError::Runtime(msg) => write!(f, "Failed to create Tokio runtime: {}", msg),
            CliError::InvalidInput(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Sites(e) => Some(e),
            CliError::Track(e) => Some(e),
            CliError::Monitoring(e) => Some(e),
            CliError::Config(_) | CliError::Runtime(_) | CliError::InvalidInput(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<SiteError> for CliError {
    fn from(e: SiteError) -> Self {
        CliError::Sites(e)
    }
}

impl From<TrackError> for CliError {
    fn from(e: TrackError) -> Self {
        CliError::Track(e)
    }
}

impl From<GeofenceError> for CliError {
    fn from(e: GeofenceError) -> Self {
        CliError::Monitoring(e)
    }
}
