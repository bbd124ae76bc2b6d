//! Great-circle distance utilities.
//!
//! Provides the Haversine surface distance used for all geofence membership
//! decisions, plus a compact distance formatter for user-facing output.

use std::f64::consts::PI;

/// Mean Earth radius in meters (spherical model).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Computes the great-circle distance between two points in meters.
///
/// Uses the Haversine formula on a spherical Earth of radius
/// [`EARTH_RADIUS_M`].
///
/// # Arguments
///
/// * `lat1`, `lon1` - First point in decimal degrees
/// * `lat2`, `lon2` - Second point in decimal degrees
///
/// # Returns
///
/// Distance in meters. Non-finite inputs yield a non-finite result, which
/// callers treat as "not inside" because every comparison against NaN is false.
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1 * PI / 180.0;
    let phi2 = lat2 * PI / 180.0;
    let delta_phi = (lat2 - lat1) * PI / 180.0;
    let delta_lambda = (lon2 - lon1) * PI / 180.0;

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 near antipodes; NaN must pass through.
    let a = if a > 1.0 { 1.0 } else { a };
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Formats a distance for display.
///
/// Distances under one kilometer are rounded to whole meters (`"250m"`),
/// longer distances use kilometers with one decimal (`"1.5km"`).
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round())
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}
