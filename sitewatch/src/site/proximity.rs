//! Proximity monitoring preconfigured for site visits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use super::{site_regions, SiteRecord, SITE_RADIUS_M};
use crate::geofence::{
    DiagnosticLog, GeofenceConfig, GeofenceError, GeofenceEvent, GeofenceRegion, LogToasts,
    NearbyRegion, NotificationSink, PositionSample, PositionSource, ProximityEngine, Toast,
    ToastSink,
};

/// Default time at a site before the "log your visit" reminder.
pub const DEFAULT_SITE_DWELL_TIME: Duration = Duration::from_secs(300);

/// Geofence monitor for a site catalog.
///
/// Shows a toast when the user arrives at a site and a reminder once they
/// have stayed for the dwell time. Arrival notifications are on.
///
/// # Example
///
/// ```ignore
/// let sites = load_sites(Path::new("sites.json"))?;
/// let proximity = SiteProximity::builder(source).sites(&sites).build();
/// proximity.start_monitoring().await?;
/// ```
#[derive(Debug)]
pub struct SiteProximity {
    engine: ProximityEngine,
}

impl SiteProximity {
    /// Start building a site monitor around the given position source.
    pub fn builder(position: Arc<dyn PositionSource>) -> SiteProximityBuilder {
        SiteProximityBuilder::new(position)
    }

    /// The underlying engine.
    pub fn engine(&self) -> &ProximityEngine {
        &self.engine
    }

    /// See [`ProximityEngine::start_monitoring`].
    pub async fn start_monitoring(&self) -> Result<(), GeofenceError> {
        self.engine.start_monitoring().await
    }

    /// See [`ProximityEngine::stop_monitoring`].
    pub fn stop_monitoring(&self) {
        self.engine.stop_monitoring();
    }

    pub fn is_monitoring(&self) -> bool {
        self.engine.is_monitoring()
    }

    pub fn current_position(&self) -> Option<PositionSample> {
        self.engine.current_position()
    }

    pub fn inside_regions(&self) -> Vec<GeofenceRegion> {
        self.engine.inside_regions()
    }

    pub fn nearby_regions(&self) -> Vec<NearbyRegion> {
        self.engine.nearby_regions()
    }

    pub fn check_proximity(&self, latitude: f64, longitude: f64) -> Vec<GeofenceRegion> {
        self.engine.check_proximity(latitude, longitude)
    }

    pub fn distance_to_region(&self, region: &GeofenceRegion) -> Option<f64> {
        self.engine.distance_to_region(region)
    }

    /// Replace the site catalog. Takes effect at the next start.
    pub fn set_sites(&self, sites: &[SiteRecord], radius: f64) {
        self.engine.set_regions(site_regions(sites, radius));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GeofenceEvent> {
        self.engine.subscribe()
    }
}

/// Builder for [`SiteProximity`].
pub struct SiteProximityBuilder {
    position: Arc<dyn PositionSource>,
    sites: Vec<SiteRecord>,
    radius: f64,
    config: GeofenceConfig,
    notifications: Option<Arc<dyn NotificationSink>>,
    toasts: Arc<dyn ToastSink>,
    diagnostics: Option<Arc<dyn DiagnosticLog>>,
}

impl SiteProximityBuilder {
    fn new(position: Arc<dyn PositionSource>) -> Self {
        Self {
            position,
            sites: Vec::new(),
            radius: SITE_RADIUS_M,
            config: GeofenceConfig::default()
                .with_dwell_time(DEFAULT_SITE_DWELL_TIME)
                .with_notifications(true),
            notifications: None,
            toasts: Arc::new(LogToasts),
            diagnostics: None,
        }
    }

    /// Sites to monitor. Sites without coordinates are ignored.
    pub fn sites(mut self, sites: &[SiteRecord]) -> Self {
        self.sites = sites.to_vec();
        self
    }

    /// Region radius around each site, in meters.
    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Time at a site before the reminder.
    pub fn dwell_time(mut self, dwell_time: Duration) -> Self {
        self.config.dwell_time = dwell_time;
        self
    }

    /// Replace the whole engine configuration.
    pub fn config(mut self, config: GeofenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    /// Sink for arrival and reminder toasts as well as the engine's own.
    pub fn toasts(mut self, sink: Arc<dyn ToastSink>) -> Self {
        self.toasts = sink;
        self
    }

    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticLog>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn build(self) -> SiteProximity {
        let arrival_toasts = Arc::clone(&self.toasts);
        let dwell_toasts = Arc::clone(&self.toasts);

        let mut builder = ProximityEngine::builder(self.position)
            .regions(site_regions(&self.sites, self.radius))
            .config(self.config)
            .toasts(self.toasts)
            .on_enter(move |event| {
                arrival_toasts.show(Toast::new(
                    "Site Nearby",
                    format!("You're near {}. Ready to start visit?", event.region.name),
                ));
            })
            .on_dwell(move |event| {
                dwell_toasts.show(Toast::new(
                    "Still at Site",
                    format!(
                        "You've been at {} for a while. Don't forget to log your visit!",
                        event.region.name
                    ),
                ));
            });

        if let Some(sink) = self.notifications {
            builder = builder.notifications(sink);
        }
        if let Some(sink) = self.diagnostics {
            builder = builder.diagnostics(sink);
        }

        SiteProximity {
            engine: builder.build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::{
        BoxFuture, LogLevel, PermissionStatus, PositionError, PositionSender, WatchId,
        WatchOptions,
    };
    use parking_lot::Mutex;
    use serde_json::Value;

    #[derive(Default)]
    struct ManualSource {
        sender: Mutex<Option<PositionSender>>,
    }

    impl ManualSource {
        fn push(&self, latitude: f64, longitude: f64) {
            if let Some(sender) = self.sender.lock().as_ref() {
                let _ = sender.send(Ok(PositionSample::new(latitude, longitude, 8.0)));
            }
        }
    }

    impl PositionSource for ManualSource {
        fn check_permissions(&self) -> BoxFuture<'_, Result<PermissionStatus, PositionError>> {
            Box::pin(async { Ok(PermissionStatus::Granted) })
        }

        fn request_permissions(&self) -> BoxFuture<'_, Result<PermissionStatus, PositionError>> {
            Box::pin(async { Ok(PermissionStatus::Granted) })
        }

        fn watch_position(
            &self,
            _options: WatchOptions,
            sender: PositionSender,
        ) -> BoxFuture<'_, Result<WatchId, PositionError>> {
            *self.sender.lock() = Some(sender);
            Box::pin(async { Ok(WatchId::new("manual")) })
        }

        fn clear_watch(&self, _id: &WatchId) {
            *self.sender.lock() = None;
        }
    }

    #[derive(Default)]
    struct ToastLog(Mutex<Vec<Toast>>);

    impl ToastSink for ToastLog {
        fn show(&self, toast: Toast) {
            self.0.lock().push(toast);
        }
    }

    struct Silent;

    impl DiagnosticLog for Silent {
        fn log(&self, _level: LogLevel, _message: &str, _context: Option<&Value>) {}
    }

    fn sites() -> Vec<SiteRecord> {
        vec![
            SiteRecord::new("s1", "Clinic", 15.50, 32.56),
            SiteRecord {
                id: "s2".into(),
                name: "Unmapped".into(),
                latitude: None,
                longitude: None,
            },
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrival_and_reminder_toasts() {
        let source = Arc::new(ManualSource::default());
        let toasts = Arc::new(ToastLog::default());
        let proximity = SiteProximity::builder(Arc::clone(&source) as Arc<dyn PositionSource>)
            .sites(&sites())
            .toasts(Arc::clone(&toasts) as Arc<dyn ToastSink>)
            .diagnostics(Arc::new(Silent))
            .build();

        proximity.start_monitoring().await.unwrap();
        assert_eq!(toasts.0.lock()[0].description, "Tracking 1 site locations");

        source.push(15.50, 32.56);
        tokio::time::sleep(Duration::from_millis(10)).await;

        {
            let shown = toasts.0.lock();
            assert_eq!(shown.len(), 2);
            assert_eq!(shown[1].title, "Site Nearby");
            assert_eq!(shown[1].description, "You're near Clinic. Ready to start visit?");
        }

        // Reminder after five minutes, not one
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(toasts.0.lock().len(), 2);

        tokio::time::sleep(Duration::from_secs(200)).await;
        let shown = toasts.0.lock();
        assert_eq!(shown.len(), 3);
        assert_eq!(shown[2].title, "Still at Site");
        assert_eq!(
            shown[2].description,
            "You've been at Clinic for a while. Don't forget to log your visit!"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delegated_state() {
        let source = Arc::new(ManualSource::default());
        let proximity = SiteProximity::builder(Arc::clone(&source) as Arc<dyn PositionSource>)
            .sites(&sites())
            .radius(250.0)
            .toasts(Arc::new(ToastLog::default()))
            .diagnostics(Arc::new(Silent))
            .build();

        assert_eq!(proximity.engine().regions().len(), 1);
        assert_eq!(proximity.engine().regions()[0].radius, 250.0);
        assert_eq!(proximity.engine().config().dwell_time, DEFAULT_SITE_DWELL_TIME);
        assert!(proximity.engine().config().enable_notifications);

        proximity.start_monitoring().await.unwrap();
        source.push(15.501, 32.56);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(proximity.is_monitoring());
        assert_eq!(proximity.inside_regions().len(), 1);
        assert_eq!(proximity.check_proximity(15.50, 32.56).len(), 1);
        let distance = proximity
            .distance_to_region(&proximity.inside_regions()[0])
            .unwrap();
        assert!(distance > 100.0 && distance < 120.0);

        proximity.stop_monitoring();
        assert!(!proximity.is_monitoring());
        assert!(proximity.current_position().is_some());
    }
}
