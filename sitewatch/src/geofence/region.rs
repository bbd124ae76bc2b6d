//! Monitored regions and proximity entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo::haversine_distance;

/// A monitored circular area.
///
/// Regions are supplied by the caller; the engine never mutates
/// them. `metadata` is an opaque bag passed through unchanged in events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRegion {
    /// Stable unique identifier.
    pub id: String,
    /// Human-readable label used in messages.
    pub name: String,
    /// Center latitude in decimal degrees.
    pub latitude: f64,
    /// Center longitude in decimal degrees.
    pub longitude: f64,
    /// Radius in meters. A point at `distance <= radius` is inside.
    pub radius: f64,
    /// Send a notification when the device enters this region.
    #[serde(default = "default_true")]
    pub notify_on_entry: bool,
    /// Send a notification when the device leaves this region, if exit
    /// notifications are enabled engine-wide.
    #[serde(default = "default_true")]
    pub notify_on_exit: bool,
    /// Caller-supplied key/value data.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl GeofenceRegion {
    /// Create a region without metadata.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude,
            longitude,
            radius,
            notify_on_entry: true,
            notify_on_exit: true,
            metadata: Map::new(),
        }
    }

    /// Choose which transitions of this region produce notifications.
    pub fn with_notifications(mut self, on_entry: bool, on_exit: bool) -> Self {
        self.notify_on_entry = on_entry;
        self.notify_on_exit = on_exit;
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Distance in meters from the given point to the region center.
    #[inline]
    pub fn distance_from(&self, latitude: f64, longitude: f64) -> f64 {
        haversine_distance(latitude, longitude, self.latitude, self.longitude)
    }

    /// Whether the given point lies inside the region.
    ///
    /// Always `false` when the distance or radius is NaN.
    #[inline]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.distance_from(latitude, longitude) <= self.radius
    }
}

/// A region the device is outside of but within twice its radius.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyRegion {
    /// The region.
    pub region: GeofenceRegion,
    /// Distance from the current position to the region center, in meters.
    pub distance: f64,
}
