//! Tracing subscriber setup.
//!
//! Console output goes to stderr. When a log file is configured, events are
//! also written to it through a non-blocking writer; keep the returned guard
//! alive until shutdown so buffered lines are flushed.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors initializing logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Failed to open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging already initialized: {0}")]
    Init(String),
}

/// Effective log level for a `-v` count.
///
/// No flag keeps the configured level; `-v` is debug, `-vv` and above trace.
pub fn level_for_verbosity(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - Default filter directive, e.g. `info` or `sitewatch=debug`
/// * `log_file` - Optional file to mirror log output into
///
/// # Returns
///
/// The file writer's guard when a log file is used.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
            filter: level.to_string(),
            message: e.to_string(),
        })?,
    };

    let console = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
        return Ok(None);
    };

    let file_error = |source| LoggingError::File {
        path: path.to_path_buf(),
        source,
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(file_error)?;

    let file_name = path.file_name().ok_or_else(|| {
        file_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "log file path has no file name",
        ))
    })?;

    let appender = tracing_appender::rolling::never(&directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(Some(guard))
}
