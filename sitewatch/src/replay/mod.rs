//! Recorded track playback.
//!
//! [`ReplayPositionSource`] implements [`PositionSource`] by replaying a
//! track file: a JSON array where each entry is either a fix or a delivery
//! error, each preceded by a delay.
//!
//! ```text
//! [
//!   { "latitude": 15.50, "longitude": 32.56, "accuracy": 8, "delay_ms": 0 },
//!   { "error": "GPS signal lost", "delay_ms": 2000 },
//!   { "latitude": 15.51, "longitude": 32.56 }
//! ]
//! ```
//!
//! Playback runs on a spawned task per watch and ends when the track is
//! exhausted or the watch is cleared. Delays are divided by the speed factor.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::geofence::{
    BoxFuture, PermissionStatus, PositionError, PositionSample, PositionSender, PositionSource,
    WatchId, WatchOptions,
};

/// Accuracy assumed for fixes that do not state one, in meters.
pub const DEFAULT_FIX_ACCURACY: f64 = 10.0;

/// Delay before an entry that does not state one, in milliseconds.
pub const DEFAULT_ENTRY_DELAY_MS: u64 = 1000;

/// Slowest accepted playback speed factor.
pub const MIN_SPEED: f64 = 0.01;

fn default_accuracy() -> f64 {
    DEFAULT_FIX_ACCURACY
}

fn default_delay() -> u64 {
    DEFAULT_ENTRY_DELAY_MS
}

/// One entry of a recorded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackEntry {
    /// A position fix.
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default = "default_accuracy")]
        accuracy: f64,
        #[serde(default = "default_delay")]
        delay_ms: u64,
    },
    /// A delivery error reported by the location service.
    Error {
        error: String,
        #[serde(default = "default_delay")]
        delay_ms: u64,
    },
}

impl TrackEntry {
    /// Fix with default accuracy and delay.
    pub fn fix(latitude: f64, longitude: f64) -> Self {
        TrackEntry::Fix {
            latitude,
            longitude,
            accuracy: DEFAULT_FIX_ACCURACY,
            delay_ms: DEFAULT_ENTRY_DELAY_MS,
        }
    }

    /// Delivery error with default delay.
    pub fn error(message: impl Into<String>) -> Self {
        TrackEntry::Error {
            error: message.into(),
            delay_ms: DEFAULT_ENTRY_DELAY_MS,
        }
    }

    /// Replace the delay before this entry.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match &mut self {
            TrackEntry::Fix { delay_ms, .. } | TrackEntry::Error { delay_ms, .. } => {
                *delay_ms = millis
            }
        }
        self
    }

    /// Delay before this entry is delivered.
    pub fn delay(&self) -> Duration {
        match self {
            TrackEntry::Fix { delay_ms, .. } | TrackEntry::Error { delay_ms, .. } => {
                Duration::from_millis(*delay_ms)
            }
        }
    }

    fn to_update(&self) -> Result<PositionSample, PositionError> {
        match self {
            TrackEntry::Fix {
                latitude,
                longitude,
                accuracy,
                ..
            } => Ok(PositionSample::new(*latitude, *longitude, *accuracy)),
            TrackEntry::Error { error, .. } => Err(PositionError::Unavailable(error.clone())),
        }
    }
}

/// Errors loading a track file.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Failed to read track file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid track file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load a recorded track from a JSON file.
pub fn load_track(path: &Path) -> Result<Vec<TrackEntry>, TrackError> {
    let content = fs::read_to_string(path).map_err(|source| TrackError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let track: Vec<TrackEntry> =
        serde_json::from_str(&content).map_err(|source| TrackError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), entries = track.len(), "Loaded track");
    Ok(track)
}

/// Position source that plays back a recorded track.
///
/// Each call to `watch_position` starts an independent playback from the
/// beginning of the track.
pub struct ReplayPositionSource {
    track: Arc<[TrackEntry]>,
    permission: PermissionStatus,
    available: bool,
    speed: f64,
    next_watch: AtomicU64,
    watches: Arc<Mutex<HashMap<WatchId, CancellationToken>>>,
}

impl ReplayPositionSource {
    /// Create a source for the given track, permission granted, real-time
    /// playback.
    pub fn new(track: Vec<TrackEntry>) -> Self {
        Self {
            track: track.into(),
            permission: PermissionStatus::Granted,
            available: true,
            speed: 1.0,
            next_watch: AtomicU64::new(1),
            watches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Permission status reported by both the check and the request.
    pub fn with_permission(mut self, permission: PermissionStatus) -> Self {
        self.permission = permission;
        self
    }

    /// Whether the source reports a location service.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Playback speed factor. Values below [`MIN_SPEED`] or non-finite
    /// values are ignored.
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed >= MIN_SPEED {
            self.speed = speed;
        }
        self
    }

    /// Number of entries in the track.
    pub fn len(&self) -> usize {
        self.track.len()
    }

    /// Whether the track has no entries.
    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }

    /// Number of watches still playing or not yet cleared.
    pub fn active_watches(&self) -> usize {
        self.watches.lock().len()
    }

    fn scaled(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() / self.speed).unwrap_or(Duration::MAX)
    }
}

impl PositionSource for ReplayPositionSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn check_permissions(&self) -> BoxFuture<'_, Result<PermissionStatus, PositionError>> {
        let status = self.permission;
        Box::pin(async move { Ok(status) })
    }

    fn request_permissions(&self) -> BoxFuture<'_, Result<PermissionStatus, PositionError>> {
        let status = self.permission;
        Box::pin(async move { Ok(status) })
    }

    fn watch_position(
        &self,
        options: WatchOptions,
        sender: PositionSender,
    ) -> BoxFuture<'_, Result<WatchId, PositionError>> {
        Box::pin(async move {
            if !self.available {
                return Err(PositionError::Unavailable(
                    "no location service".to_string(),
                ));
            }
            if !self.permission.is_granted() {
                return Err(PositionError::PermissionDenied);
            }

            let id = WatchId::new(format!(
                "replay-{}",
                self.next_watch.fetch_add(1, Ordering::Relaxed)
            ));
            let token = CancellationToken::new();
            self.watches.lock().insert(id.clone(), token.clone());

            let schedule: Vec<(Duration, TrackEntry)> = self
                .track
                .iter()
                .map(|entry| (self.scaled(entry.delay()), entry.clone()))
                .collect();

            info!(
                watch_id = %id,
                entries = schedule.len(),
                speed = self.speed,
                high_accuracy = options.enable_high_accuracy,
                "Track playback started"
            );

            let watches = Arc::clone(&self.watches);
            let watch_id = id.clone();
            tokio::spawn(async move {
                play(schedule, sender, token).await;
                watches.lock().remove(&watch_id);
                debug!(watch_id = %watch_id, "Track playback finished");
            });

            Ok(id)
        })
    }

    fn clear_watch(&self, id: &WatchId) {
        if let Some(token) = self.watches.lock().remove(id) {
            token.cancel();
            debug!(watch_id = %id, "Track playback cleared");
        }
    }
}

impl std::fmt::Debug for ReplayPositionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayPositionSource")
            .field("entries", &self.track.len())
            .field("permission", &self.permission)
            .field("available", &self.available)
            .field("speed", &self.speed)
            .finish()
    }
}

async fn play(
    schedule: Vec<(Duration, TrackEntry)>,
    sender: PositionSender,
    token: CancellationToken,
) {
    for (delay, entry) in schedule {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        if sender.send(entry.to_update()).is_err() {
            // Receiver dropped, nobody is listening
            return;
        }
    }
}
