//! Error types for starting the proximity engine.

use thiserror::Error;

use super::position::PositionError;

/// Reasons `start_monitoring` can leave the engine idle.
///
/// Every variant has already been reported to the toast and diagnostic
/// sinks by the time it is returned; callers may simply retry later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeofenceError {
    /// The platform has no location service.
    #[error("Geofencing is not available on this platform")]
    Unavailable,

    /// The user refused location access.
    #[error("Location permission denied")]
    PermissionDenied,

    /// The position source failed during permission checks or subscription.
    #[error("Failed to start geofencing: {0}")]
    Position(#[from] PositionError),

    /// `stop_monitoring` ran while the start was still in progress.
    #[error("Monitoring was stopped before it started")]
    Cancelled,
}

impl GeofenceError {
    /// Whether retrying later may succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, GeofenceError::Position(_) | GeofenceError::Cancelled)
    }
}
