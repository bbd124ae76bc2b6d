//! Builder for [`ProximityEngine`].

use std::sync::Arc;

use super::config::GeofenceConfig;
use super::engine::{EngineServices, ProximityEngine};
use super::event::{GeofenceEvent, GeofenceHandlers};
use super::position::PositionSource;
use super::region::GeofenceRegion;
use super::sinks::{
    DiagnosticLog, LogNotifications, LogToasts, NotificationSink, ToastSink, TracingDiagnostics,
};

/// Assembles a [`ProximityEngine`] from its collaborators.
///
/// Only the position source is required. Notifications, toasts and
/// diagnostics default to `tracing`-backed sinks.
///
/// # Example
///
/// ```ignore
/// let engine = ProximityEngine::builder(source)
///     .regions(regions)
///     .config(GeofenceConfig::default().with_dwell_time(Duration::from_secs(300)))
///     .on_dwell(|event| println!("still at {}", event.region.name))
///     .build();
/// ```
pub struct ProximityEngineBuilder {
    position: Arc<dyn PositionSource>,
    regions: Vec<GeofenceRegion>,
    config: GeofenceConfig,
    handlers: GeofenceHandlers,
    notifications: Option<Arc<dyn NotificationSink>>,
    toasts: Option<Arc<dyn ToastSink>>,
    diagnostics: Option<Arc<dyn DiagnosticLog>>,
}

impl ProximityEngineBuilder {
    pub(crate) fn new(position: Arc<dyn PositionSource>) -> Self {
        Self {
            position,
            regions: Vec::new(),
            config: GeofenceConfig::default(),
            handlers: GeofenceHandlers::default(),
            notifications: None,
            toasts: None,
            diagnostics: None,
        }
    }

    /// Regions to monitor.
    pub fn regions(mut self, regions: Vec<GeofenceRegion>) -> Self {
        self.regions = regions;
        self
    }

    /// Engine configuration.
    pub fn config(mut self, config: GeofenceConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace all observers at once.
    pub fn handlers(mut self, handlers: GeofenceHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Observer for region entry.
    pub fn on_enter(mut self, f: impl Fn(&GeofenceEvent) + Send + Sync + 'static) -> Self {
        self.handlers = self.handlers.on_enter(f);
        self
    }

    /// Observer for region exit.
    pub fn on_exit(mut self, f: impl Fn(&GeofenceEvent) + Send + Sync + 'static) -> Self {
        self.handlers = self.handlers.on_exit(f);
        self
    }

    /// Observer for dwell. Dwell timers are only armed when this is set.
    pub fn on_dwell(mut self, f: impl Fn(&GeofenceEvent) + Send + Sync + 'static) -> Self {
        self.handlers = self.handlers.on_dwell(f);
        self
    }

    /// Sink for local notifications.
    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    /// Sink for user-facing toasts.
    pub fn toasts(mut self, sink: Arc<dyn ToastSink>) -> Self {
        self.toasts = Some(sink);
        self
    }

    /// Sink for the diagnostic audit trail.
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticLog>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Build the engine. It starts idle.
    pub fn build(self) -> ProximityEngine {
        let services = EngineServices {
            position: self.position,
            notifications: self
                .notifications
                .unwrap_or_else(|| Arc::new(LogNotifications)),
            toasts: self.toasts.unwrap_or_else(|| Arc::new(LogToasts)),
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Arc::new(TracingDiagnostics)),
        };

        ProximityEngine::from_parts(self.regions, self.config, self.handlers, services)
    }
}

impl std::fmt::Debug for ProximityEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProximityEngineBuilder")
            .field("regions", &self.regions.len())
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}
