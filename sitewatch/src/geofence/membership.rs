//! Membership tracking and transition detection.
//!
//! Given the region catalog and a position, the tracker recomputes which
//! regions contain the device and diffs that against the previous sample.
//!
//! # Detection Logic
//!
//! ```text
//! inside:  distance <= radius
//! nearby:  radius < distance <= 2 × radius      (sorted ascending)
//! enter:   inside now, not inside at previous sample
//! exit:    inside at previous sample, not inside now
//! ```
//!
//! Membership is recomputed in full on every sample, never patched, so any
//! transient inconsistency heals at the next fix. A non-finite distance fails
//! both comparisons and the region is skipped for that sample.

use std::collections::HashSet;

use super::region::{GeofenceRegion, NearbyRegion};

/// Point-in-time membership computed for one position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipSnapshot {
    /// Regions containing the position, in catalog order.
    pub inside: Vec<GeofenceRegion>,
    /// Regions outside but within twice their radius, nearest first.
    pub nearby: Vec<NearbyRegion>,
}

impl MembershipSnapshot {
    /// Evaluate every region against the given position.
    pub fn evaluate(regions: &[GeofenceRegion], latitude: f64, longitude: f64) -> Self {
        let mut inside = Vec::new();
        let mut nearby = Vec::new();

        for region in regions {
            let distance = region.distance_from(latitude, longitude);

            if distance <= region.radius {
                inside.push(region.clone());
            } else if distance <= region.radius * 2.0 {
                nearby.push(NearbyRegion {
                    region: region.clone(),
                    distance,
                });
            }
        }

        nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Self { inside, nearby }
    }
}

/// Regions whose membership changed at the latest sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transitions {
    /// Newly inside, in catalog order.
    pub entered: Vec<GeofenceRegion>,
    /// No longer inside, in previous-membership order.
    pub exited: Vec<GeofenceRegion>,
}

impl Transitions {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// Holds membership between samples and derives enter/exit transitions.
#[derive(Debug, Default)]
pub struct MembershipTracker {
    /// Ids inside at the last sample.
    inside_ids: HashSet<String>,
    /// Published membership from the last sample.
    snapshot: MembershipSnapshot,
}

impl MembershipTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a position and replace the membership state.
    ///
    /// # Returns
    ///
    /// The regions entered and exited relative to the previous sample.
    pub fn update(
        &mut self,
        regions: &[GeofenceRegion],
        latitude: f64,
        longitude: f64,
    ) -> Transitions {
        let snapshot = MembershipSnapshot::evaluate(regions, latitude, longitude);
        self.apply(snapshot)
    }

    /// Replace the membership state with a precomputed snapshot.
    pub fn apply(&mut self, snapshot: MembershipSnapshot) -> Transitions {
        let mut current_ids = HashSet::with_capacity(snapshot.inside.len());
        let mut entered = Vec::new();

        for region in &snapshot.inside {
            // A repeated id within one catalog enters once
            if current_ids.insert(region.id.clone()) && !self.inside_ids.contains(&region.id) {
                entered.push(region.clone());
            }
        }

        let mut exited_ids = HashSet::new();
        let exited = self
            .snapshot
            .inside
            .iter()
            .filter(|region| {
                !current_ids.contains(&region.id) && exited_ids.insert(region.id.clone())
            })
            .cloned()
            .collect();

        self.inside_ids = current_ids;
        self.snapshot = snapshot;

        Transitions { entered, exited }
    }

    /// Regions inside at the last sample, in catalog order.
    pub fn inside(&self) -> &[GeofenceRegion] {
        &self.snapshot.inside
    }

    /// Nearby regions at the last sample, nearest first.
    pub fn nearby(&self) -> &[NearbyRegion] {
        &self.snapshot.nearby
    }

    /// Whether the region with the given id was inside at the last sample.
    pub fn is_inside(&self, region_id: &str) -> bool {
        self.inside_ids.contains(region_id)
    }

    /// Forget all membership.
    pub fn clear(&mut self) {
        self.inside_ids.clear();
        self.snapshot = MembershipSnapshot::default();
    }
}
