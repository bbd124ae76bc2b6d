//! Proximity engine: live geofence monitoring over a position stream.
//!
//! The [`ProximityEngine`] owns the region catalog, the membership state and
//! the per-region dwell timers. While monitoring it:
//! - Consumes position deliveries from a [`PositionSource`] on a spawned task
//! - Recomputes membership for every fix and diffs it against the last one
//! - Fires enter/exit observers, schedules arrival notifications
//! - Arms a dwell timer on enter and cancels it on exit
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        ProximityEngine                            │
//! │                                                                   │
//! │  start_monitoring() ──► permission check ──► watch_position()     │
//! │                                                   │               │
//! │                                   mpsc<PositionUpdate>            │
//! │                                                   ▼               │
//! │                                         ┌──────────────────┐      │
//! │                                         │   sample loop    │      │
//! │                                         └────────┬─────────┘      │
//! │                         Err ──► diagnostics      │ Ok             │
//! │                                                  ▼                │
//! │                                   MembershipTracker::update()     │
//! │                                        │                │         │
//! │                                     entered           exited      │
//! │                                        │                │         │
//! │                  on_enter + notify + arm dwell   on_exit + disarm │
//! │                                                                   │
//! │  stop_monitoring() ──► cancel session ──► clear_watch, cancel all │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! All state sits behind one mutex. Membership and timers are updated under
//! the lock; observers run after it is released, so they may call back into
//! the engine. Every session has its own cancellation token, checked under
//! the lock before any state change, so a delivery or timer racing
//! `stop_monitoring` cannot repopulate state after the stop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::builder::ProximityEngineBuilder;
use super::config::GeofenceConfig;
use super::dwell::DwellTimers;
use super::error::GeofenceError;
use super::event::{GeofenceEvent, GeofenceEventKind, GeofenceHandlers};
use super::membership::MembershipTracker;
use super::position::{PositionError, PositionReceiver, PositionSample, PositionSource, WatchId};
use super::region::{GeofenceRegion, NearbyRegion};
use super::sinks::{DiagnosticLog, LogLevel, Notification, NotificationSink, Toast, ToastSink};

/// Default search distance for [`ProximityEngine::regions_within`], in meters.
pub const DEFAULT_SEARCH_DISTANCE_M: f64 = 5000.0;

/// Collaborators the engine reports to and reads from.
#[derive(Clone)]
pub(crate) struct EngineServices {
    pub(crate) position: Arc<dyn PositionSource>,
    pub(crate) notifications: Arc<dyn NotificationSink>,
    pub(crate) toasts: Arc<dyn ToastSink>,
    pub(crate) diagnostics: Arc<dyn DiagnosticLog>,
}

/// Geofence proximity monitor.
///
/// Created through [`ProximityEngine::builder`]. Dropping the engine stops
/// monitoring, releasing the position watch and every dwell timer.
///
/// # Example
///
/// ```ignore
/// use sitewatch::geofence::{GeofenceRegion, ProximityEngine};
///
/// let engine = ProximityEngine::builder(position_source)
///     .regions(vec![GeofenceRegion::new("s1", "Clinic", 15.5, 32.56, 100.0)])
///     .on_enter(|event| println!("arrived at {}", event.region.name))
///     .build();
///
/// engine.start_monitoring().await?;
/// // ...
/// engine.stop_monitoring();
/// ```
pub struct ProximityEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    /// Latest catalog supplied by the caller. Sessions take a snapshot.
    catalog: RwLock<Arc<[GeofenceRegion]>>,
    config: GeofenceConfig,
    handlers: GeofenceHandlers,
    services: EngineServices,
    events: broadcast::Sender<GeofenceEvent>,
    notification_ids: AtomicU32,
    state: Mutex<EngineState>,
}

#[derive(Default)]
struct EngineState {
    monitoring: bool,
    /// A start is suspended on the position source.
    starting: bool,
    /// Bumped by every stop so a suspended start can tell it was overtaken.
    epoch: u64,
    current_position: Option<PositionSample>,
    membership: MembershipTracker,
    timers: DwellTimers,
    session: Option<Session>,
}

struct Session {
    watch_id: WatchId,
    cancel: CancellationToken,
}

/// Clears the `starting` flag on every exit path of a start, including a
/// dropped future.
struct StartGuard<'a> {
    state: &'a Mutex<EngineState>,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().starting = false;
    }
}

impl ProximityEngine {
    /// Start building an engine around the given position source.
    pub fn builder(position: Arc<dyn PositionSource>) -> ProximityEngineBuilder {
        ProximityEngineBuilder::new(position)
    }

    pub(crate) fn from_parts(
        regions: Vec<GeofenceRegion>,
        config: GeofenceConfig,
        handlers: GeofenceHandlers,
        services: EngineServices,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Self {
            inner: Arc::new(EngineInner {
                catalog: RwLock::new(regions.into()),
                config,
                handlers,
                services,
                events,
                notification_ids: AtomicU32::new(1),
                state: Mutex::new(EngineState::default()),
            }),
        }
    }

    /// Whether a monitoring session is active.
    pub fn is_monitoring(&self) -> bool {
        self.inner.state.lock().monitoring
    }

    /// Most recent fix, kept across stops. `None` before the first fix.
    pub fn current_position(&self) -> Option<PositionSample> {
        self.inner.state.lock().current_position.clone()
    }

    /// Regions currently containing the device, in catalog order.
    pub fn inside_regions(&self) -> Vec<GeofenceRegion> {
        self.inner.state.lock().membership.inside().to_vec()
    }

    /// Regions the device is outside of but within twice their radius,
    /// nearest first.
    pub fn nearby_regions(&self) -> Vec<NearbyRegion> {
        self.inner.state.lock().membership.nearby().to_vec()
    }

    /// Whether the region with the given id currently contains the device.
    pub fn is_inside(&self, region_id: &str) -> bool {
        self.inner.state.lock().membership.is_inside(region_id)
    }

    /// The region catalog.
    pub fn regions(&self) -> Vec<GeofenceRegion> {
        self.inner.catalog.read().to_vec()
    }

    /// Look up a region by id.
    pub fn region(&self, region_id: &str) -> Option<GeofenceRegion> {
        self.inner
            .catalog
            .read()
            .iter()
            .find(|region| region.id == region_id)
            .cloned()
    }

    /// Replace the region catalog.
    ///
    /// A running session keeps the catalog it started with; the new list
    /// takes effect at the next [`start_monitoring`](Self::start_monitoring).
    pub fn set_regions(&self, regions: Vec<GeofenceRegion>) {
        let count = regions.len();
        *self.inner.catalog.write() = regions.into();
        debug!(
            regions = count,
            monitoring = self.is_monitoring(),
            "Region catalog replaced"
        );
    }

    /// Add a region, replacing any region with the same id in place.
    ///
    /// Takes effect at the next start, like [`set_regions`](Self::set_regions).
    pub fn add_region(&self, region: GeofenceRegion) {
        let mut catalog = self.inner.catalog.write();
        let mut regions = catalog.to_vec();
        match regions.iter_mut().find(|r| r.id == region.id) {
            Some(existing) => *existing = region.clone(),
            None => regions.push(region.clone()),
        }
        *catalog = regions.into();
        debug!(region_id = %region.id, name = %region.name, "Region added");
    }

    /// Remove every region with the given id.
    ///
    /// Returns `false` if no such region was in the catalog. Takes effect at
    /// the next start.
    pub fn remove_region(&self, region_id: &str) -> bool {
        let mut catalog = self.inner.catalog.write();
        let before = catalog.len();
        let regions: Vec<_> = catalog.iter().filter(|r| r.id != region_id).cloned().collect();
        let removed = regions.len() != before;
        if removed {
            *catalog = regions.into();
            debug!(region_id, "Region removed");
        }
        removed
    }

    /// Empty the region catalog. Takes effect at the next start.
    pub fn clear_regions(&self) {
        *self.inner.catalog.write() = Vec::<GeofenceRegion>::new().into();
        debug!("Region catalog cleared");
    }

    /// Catalog regions whose center lies within `max_distance` meters of the
    /// last known position, nearest first.
    ///
    /// Unlike [`nearby_regions`](Self::nearby_regions) this ignores region
    /// radii and includes containing regions. Empty before the first fix.
    pub fn regions_within(&self, max_distance: f64) -> Vec<NearbyRegion> {
        let Some(position) = self.current_position() else {
            return Vec::new();
        };

        let mut found: Vec<_> = self
            .inner
            .catalog
            .read()
            .iter()
            .map(|region| NearbyRegion {
                distance: region.distance_from(position.latitude, position.longitude),
                region: region.clone(),
            })
            .filter(|entry| entry.distance <= max_distance)
            .collect();
        found.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        found
    }

    /// Engine configuration.
    pub fn config(&self) -> &GeofenceConfig {
        &self.inner.config
    }

    /// Receive every event the engine emits, after the matching observer.
    pub fn subscribe(&self) -> broadcast::Receiver<GeofenceEvent> {
        self.inner.events.subscribe()
    }

    /// Start monitoring.
    ///
    /// Checks (and if needed requests) location permission, then subscribes
    /// to the position source. Does nothing if a session is already active or
    /// starting. Failures are reported to the toast and diagnostic sinks
    /// before being returned, and leave the engine idle.
    pub async fn start_monitoring(&self) -> Result<(), GeofenceError> {
        self.inner.start().await
    }

    /// Stop monitoring.
    ///
    /// Releases the position watch, cancels every dwell timer and clears
    /// membership. The last known position is kept. Safe to call when idle.
    pub fn stop_monitoring(&self) {
        self.inner.stop();
    }

    /// Regions containing the given point. Independent of monitoring state.
    pub fn check_proximity(&self, latitude: f64, longitude: f64) -> Vec<GeofenceRegion> {
        self.inner
            .catalog
            .read()
            .iter()
            .filter(|region| region.contains(latitude, longitude))
            .cloned()
            .collect()
    }

    /// Distance from the last known position to the region center.
    ///
    /// `None` if no fix has been received yet.
    pub fn distance_to_region(&self, region: &GeofenceRegion) -> Option<f64> {
        self.current_position()
            .map(|position| region.distance_from(position.latitude, position.longitude))
    }
}

impl Drop for ProximityEngine {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl std::fmt::Debug for ProximityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ProximityEngine")
            .field("config", &self.inner.config)
            .field("handlers", &self.inner.handlers)
            .field("monitoring", &state.monitoring)
            .field("inside", &state.membership.inside().len())
            .field("dwell_timers", &state.timers.len())
            .finish_non_exhaustive()
    }
}

impl EngineInner {
    async fn start(self: &Arc<Self>) -> Result<(), GeofenceError> {
        let epoch = {
            let mut state = self.state.lock();
            if state.monitoring || state.starting {
                debug!("Geofencing already active");
                return Ok(());
            }
            state.starting = true;
            state.epoch
        };
        let _guard = StartGuard { state: &self.state };

        self.open_session(epoch).await
    }

    async fn open_session(self: &Arc<Self>, epoch: u64) -> Result<(), GeofenceError> {
        let source = Arc::clone(&self.services.position);

        if !source.is_available() {
            self.diagnose(
                LogLevel::Warn,
                "Geofencing only available on native platforms",
                None,
            );
            return Err(GeofenceError::Unavailable);
        }

        match ensure_permission(source.as_ref()).await {
            Ok(true) => {}
            Ok(false) => {
                self.diagnose(LogLevel::Warn, "Location permission denied", None);
                self.services.toasts.show(Toast::destructive(
                    "Location Required",
                    "Enable location access for site proximity alerts",
                ));
                return Err(GeofenceError::PermissionDenied);
            }
            Err(err) => return Err(self.start_failed(err)),
        }

        let regions = Arc::clone(&*self.catalog.read());
        let (sender, receiver) = mpsc::unbounded_channel();

        let watch_id = match source
            .watch_position(self.config.watch_options(), sender)
            .await
        {
            Ok(id) => id,
            Err(err) => return Err(self.start_failed(err)),
        };

        let cancel = CancellationToken::new();
        {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                drop(state);
                debug!(watch_id = %watch_id, "Stopped during start, releasing watch");
                source.clear_watch(&watch_id);
                return Err(GeofenceError::Cancelled);
            }
            state.session = Some(Session {
                watch_id,
                cancel: cancel.clone(),
            });
            state.monitoring = true;
        }

        let region_count = regions.len();
        tokio::spawn(Arc::clone(self).run_session(receiver, regions, cancel));

        self.diagnose(
            LogLevel::Info,
            "Geofencing monitoring started",
            Some(&json!({ "regionCount": region_count })),
        );
        self.services.toasts.show(Toast::new(
            "Site Monitoring Active",
            format!("Tracking {} site locations", region_count),
        ));

        Ok(())
    }

    fn start_failed(&self, err: PositionError) -> GeofenceError {
        self.diagnose(
            LogLevel::Error,
            "Failed to start geofencing",
            Some(&json!({ "error": err.to_string() })),
        );
        self.services.toasts.show(Toast::destructive(
            "Monitoring Failed",
            "Could not start site proximity tracking",
        ));
        GeofenceError::Position(err)
    }

    fn stop(&self) {
        let session = {
            let mut state = self.state.lock();
            state.epoch = state.epoch.wrapping_add(1);
            let session = state.session.take();
            if let Some(session) = &session {
                session.cancel.cancel();
            }
            state.timers.cancel_all();
            state.membership.clear();
            state.monitoring = false;
            session
        };

        if let Some(session) = session {
            self.services.position.clear_watch(&session.watch_id);
            self.diagnose(LogLevel::Info, "Geofencing monitoring stopped", None);
        }
    }

    /// Sample loop for one monitoring session.
    async fn run_session(
        self: Arc<Self>,
        mut receiver: PositionReceiver,
        regions: Arc<[GeofenceRegion]>,
        cancel: CancellationToken,
    ) {
        debug!(regions = regions.len(), "Geofence sample loop started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                update = receiver.recv() => match update {
                    Some(Ok(sample)) => self.handle_sample(&regions, sample, &cancel),
                    Some(Err(err)) => self.diagnose(
                        LogLevel::Error,
                        "Geofencing position error",
                        Some(&json!({ "error": err.to_string() })),
                    ),
                    None => {
                        debug!("Position stream closed by source");
                        break;
                    }
                }
            }
        }

        debug!("Geofence sample loop stopped");
    }

    fn handle_sample(
        self: &Arc<Self>,
        regions: &[GeofenceRegion],
        sample: PositionSample,
        session: &CancellationToken,
    ) {
        let arm_dwell = self.handlers.has_dwell() && !self.config.dwell_time.is_zero();

        let transitions = {
            let mut state = self.state.lock();
            if session.is_cancelled() {
                debug!("Discarding position delivered after stop");
                return;
            }

            let transitions =
                state
                    .membership
                    .update(regions, sample.latitude, sample.longitude);
            state.current_position = Some(sample.clone());

            for region in &transitions.exited {
                state.timers.cancel(&region.id);
            }

            if arm_dwell {
                for region in &transitions.entered {
                    let inner = Arc::clone(self);
                    let dwelling = region.clone();
                    state
                        .timers
                        .arm(&region.id, self.config.dwell_time, session, move |token| {
                            async move { inner.fire_dwell(dwelling, &token) }
                        });
                }
            }

            debug!(
                latitude = sample.latitude,
                longitude = sample.longitude,
                accuracy = sample.accuracy,
                inside = state.membership.inside().len(),
                nearby = state.membership.nearby().len(),
                entered = transitions.entered.len(),
                exited = transitions.exited.len(),
                "Geofence sample evaluated"
            );

            transitions
        };

        for region in transitions.entered {
            self.diagnose(
                LogLevel::Info,
                &format!("Entered geofence: {}", region.name),
                Some(&json!({ "regionId": region.id })),
            );
            let event = GeofenceEvent::new(GeofenceEventKind::Enter, region, sample.clone());
            self.handlers.dispatch(&event);
            self.notify(&event);
            self.publish(event);
        }

        for region in transitions.exited {
            self.diagnose(
                LogLevel::Info,
                &format!("Exited geofence: {}", region.name),
                Some(&json!({ "regionId": region.id })),
            );
            let event = GeofenceEvent::new(GeofenceEventKind::Exit, region, sample.clone());
            self.handlers.dispatch(&event);
            self.notify(&event);
            self.publish(event);
        }
    }

    /// Dwell timer expiry. Carries the freshest position at firing time.
    fn fire_dwell(&self, region: GeofenceRegion, token: &CancellationToken) {
        let position = {
            let mut state = self.state.lock();
            if token.is_cancelled() {
                return;
            }
            state.timers.release(&region.id);
            state.current_position.clone()
        };

        let Some(position) = position else {
            return;
        };

        self.diagnose(
            LogLevel::Info,
            &format!("Dwelling in geofence: {}", region.name),
            Some(&json!({ "regionId": region.id })),
        );
        let event = GeofenceEvent::new(GeofenceEventKind::Dwell, region, position);
        self.handlers.dispatch(&event);
        self.publish(event);
    }

    fn publish(&self, event: GeofenceEvent) {
        // Err only means nobody is subscribed
        let _ = self.events.send(event);
    }

    /// Schedule the notification for an event, if the engine config and the
    /// region's own flags both ask for one.
    fn notify(&self, event: &GeofenceEvent) {
        if !self.config.enable_notifications {
            return;
        }

        let region = &event.region;
        let (title, body) = match event.kind {
            GeofenceEventKind::Enter if region.notify_on_entry => {
                ("Site Nearby", format!("You've arrived at {}", region.name))
            }
            GeofenceEventKind::Exit if self.config.notify_on_exit && region.notify_on_exit => {
                ("Left Site", format!("You've left {}", region.name))
            }
            _ => return,
        };

        let notification = Notification {
            id: self.notification_ids.fetch_add(1, Ordering::Relaxed),
            title: title.to_string(),
            body,
            deliver_at: Utc::now(),
            payload: json!({
                "regionId": region.id,
                "type": format!("geofence_{}", event.kind),
            }),
        };

        let sink = Arc::clone(&self.services.notifications);
        let diagnostics = Arc::clone(&self.services.diagnostics);
        tokio::spawn(async move {
            let notification_id = notification.id;
            if let Err(err) = sink.schedule(notification).await {
                diagnostics.log(
                    LogLevel::Error,
                    "Failed to send geofence notification",
                    Some(&json!({ "id": notification_id, "error": err.to_string() })),
                );
            }
        });
    }

    fn diagnose(&self, level: LogLevel, message: &str, context: Option<&Value>) {
        self.services.diagnostics.log(level, message, context);
    }
}

/// Ensure location permission, prompting once if it is not yet granted.
async fn ensure_permission(source: &dyn PositionSource) -> Result<bool, PositionError> {
    let status = source.check_permissions().await?;
    if status.is_granted() {
        return Ok(true);
    }

    debug!(status = %status, "Requesting location permission");
    let status = source.request_permissions().await?;
    Ok(status.is_granted())
}
