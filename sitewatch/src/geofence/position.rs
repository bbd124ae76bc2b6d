//! Position samples and the position source contract.
//!
//! The engine never talks to a device location API directly. It depends on
//! the [`PositionSource`] trait, which wraps whatever supplies fixes (a
//! platform location service, a recorded track, a test double).
//!
//! # Delivery Model
//!
//! ```text
//! PositionSource ──watch_position()──► PositionSender (mpsc, unbounded)
//!                                            │
//!                                            ▼
//!                                   engine sample loop ──► transition detection
//! ```
//!
//! Each delivery is either a fix or a [`PositionError`]. Deliveries are
//! processed strictly in order.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single delivery from a position source.
pub type PositionUpdate = Result<PositionSample, PositionError>;

/// Sending half handed to a position source when a watch starts.
pub type PositionSender = mpsc::UnboundedSender<PositionUpdate>;

/// Receiving half consumed by the engine's sample loop.
pub type PositionReceiver = mpsc::UnboundedReceiver<PositionUpdate>;

/// A single position reading.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Reported accuracy in meters. Informational only.
    pub accuracy: f64,
    /// When the fix was taken (or received).
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    /// Create a sample stamped with the current time.
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self::with_timestamp(latitude, longitude, accuracy, Utc::now())
    }

    /// Create a sample with an explicit timestamp.
    pub fn with_timestamp(
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp,
        }
    }
}

/// Location permission state reported by a position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Location access is granted.
    Granted,
    /// Location access was refused.
    Denied,
    /// The user has not decided yet; a request will prompt.
    Prompt,
}

impl PermissionStatus {
    /// Whether location access is usable.
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::Prompt => write!(f, "prompt"),
        }
    }
}

/// Default fix timeout.
pub const DEFAULT_WATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum age of a cached fix.
pub const DEFAULT_MAXIMUM_AGE: Duration = Duration::from_secs(5);

/// Options passed to [`PositionSource::watch_position`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Prefer high-accuracy fixes.
    pub enable_high_accuracy: bool,
    /// How long to wait for a fix before reporting a timeout.
    pub timeout: Duration,
    /// Maximum staleness of a cached fix.
    pub maximum_age: Duration,
    /// Suggested delivery cadence. Sources are free to ignore it.
    pub interval_hint: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: DEFAULT_WATCH_TIMEOUT,
            maximum_age: DEFAULT_MAXIMUM_AGE,
            interval_hint: Duration::from_secs(10),
        }
    }
}

/// Identifier of an active position watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchId(String);

impl WatchId {
    /// Create a watch identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors reported by a position source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// No fix was obtained within the configured timeout.
    #[error("Position fix timed out")]
    Timeout,

    /// The position signal is currently unavailable.
    #[error("Position unavailable: {0}")]
    Unavailable(String),

    /// Location permission was revoked or never granted.
    #[error("Location permission denied")]
    PermissionDenied,

    /// The watch could not be established.
    #[error("Failed to watch position: {0}")]
    WatchFailed(String),

    /// Any other source failure.
    #[error("Position source error: {0}")]
    Other(String),
}

/// Supplies position fixes to the engine.
///
/// Implementations must be `Send + Sync`; async methods return boxed futures
/// so the engine can hold an `Arc<dyn PositionSource>`.
pub trait PositionSource: Send + Sync {
    /// Whether a location service exists on this platform at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Query the current permission status without prompting.
    fn check_permissions(&self) -> BoxFuture<'_, Result<PermissionStatus, PositionError>>;

    /// Ask for location permission.
    fn request_permissions(&self) -> BoxFuture<'_, Result<PermissionStatus, PositionError>>;

    /// Begin delivering fixes to `sender` until [`clear_watch`](Self::clear_watch)
    /// is called with the returned id.
    fn watch_position(
        &self,
        options: WatchOptions,
        sender: PositionSender,
    ) -> BoxFuture<'_, Result<WatchId, PositionError>>;

    /// Stop a watch. Unknown ids are ignored.
    fn clear_watch(&self, id: &WatchId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_options_defaults() {
        let options = WatchOptions::default();
        assert!(options.enable_high_accuracy);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.maximum_age, Duration::from_secs(5));
    }

    #[test]
    fn test_permission_status() {
        assert!(PermissionStatus::Granted.is_granted());
        assert!(!PermissionStatus::Denied.is_granted());
        assert!(!PermissionStatus::Prompt.is_granted());
        assert_eq!(PermissionStatus::Denied.to_string(), "denied");
    }

    #[test]
    fn test_position_error_display() {
        assert_eq!(PositionError::Timeout.to_string(), "Position fix timed out");
        assert!(PositionError::Unavailable("no signal".into())
            .to_string()
            .contains("no signal"));
    }
}
