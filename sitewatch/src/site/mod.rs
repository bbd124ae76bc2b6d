//! Site visit proximity.
//!
//! Turns a list of field sites into geofence regions and wraps the proximity
//! engine with the user-facing prompts of a site visit workflow.
//!
//! Sites without coordinates are skipped; every region carries the site id in
//! its metadata so events can be traced back to the site record.

mod proximity;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geofence::GeofenceRegion;

pub use proximity::{SiteProximity, SiteProximityBuilder, DEFAULT_SITE_DWELL_TIME};

/// Default geofence radius around a site, in meters.
pub const SITE_RADIUS_M: f64 = 100.0;

/// A field site as stored in the site catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl SiteRecord {
    /// Create a site with coordinates.
    pub fn new(id: impl Into<String>, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Coordinates, if both are present and finite.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// Geofence region around the site, or `None` if it has no usable
    /// coordinates.
    pub fn to_region(&self, radius: f64) -> Option<GeofenceRegion> {
        let (latitude, longitude) = self.coordinates()?;
        Some(
            GeofenceRegion::new(self.id.clone(), self.name.clone(), latitude, longitude, radius)
                .with_metadata("siteId", self.id.clone()),
        )
    }
}

/// Build geofence regions for every site with coordinates.
///
/// # Arguments
///
/// * `sites` - Site catalog
/// * `radius` - Region radius in meters, applied to every site
///
/// # Returns
///
/// One region per located site, in catalog order.
pub fn site_regions(sites: &[SiteRecord], radius: f64) -> Vec<GeofenceRegion> {
    let regions: Vec<_> = sites.iter().filter_map(|site| site.to_region(radius)).collect();

    if regions.len() < sites.len() {
        debug!(
            skipped = sites.len() - regions.len(),
            "Sites without coordinates are not monitored"
        );
    }

    regions
}

/// Errors loading a site catalog.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Failed to read site file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid site file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load a site catalog from a JSON array of site records.
pub fn load_sites(path: &Path) -> Result<Vec<SiteRecord>, SiteError> {
    let content = fs::read_to_string(path).map_err(|source| SiteError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let sites: Vec<SiteRecord> =
        serde_json::from_str(&content).map_err(|source| SiteError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), sites = sites.len(), "Loaded site catalog");
    Ok(sites)
}
