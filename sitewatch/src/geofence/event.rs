//! Geofence transition events and observer callbacks.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::position::PositionSample;
use super::region::GeofenceRegion;

/// Kind of geofence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeofenceEventKind {
    /// The device moved from outside to inside a region.
    Enter,
    /// The device moved from inside to outside a region.
    Exit,
    /// The device stayed inside a region for the configured dwell time.
    Dwell,
}

impl GeofenceEventKind {
    /// Short lowercase name, as used in notification payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceEventKind::Enter => "enter",
            GeofenceEventKind::Exit => "exit",
            GeofenceEventKind::Dwell => "dwell",
        }
    }
}

impl fmt::Display for GeofenceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected transition. Built at the moment of detection and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceEvent {
    /// Region the transition concerns.
    pub region: GeofenceRegion,
    /// Transition kind.
    pub kind: GeofenceEventKind,
    /// When the transition was detected (or the dwell timer fired).
    pub timestamp: DateTime<Utc>,
    /// Position associated with the transition.
    pub position: PositionSample,
}

impl GeofenceEvent {
    /// Create an event stamped with the current time.
    pub fn new(kind: GeofenceEventKind, region: GeofenceRegion, position: PositionSample) -> Self {
        Self {
            region,
            kind,
            timestamp: Utc::now(),
            position,
        }
    }
}

/// Observer invoked for a geofence event.
pub type GeofenceCallback = Arc<dyn Fn(&GeofenceEvent) + Send + Sync>;

/// Optional enter/exit/dwell observers supplied at construction.
#[derive(Clone, Default)]
pub struct GeofenceHandlers {
    pub(crate) on_enter: Option<GeofenceCallback>,
    pub(crate) on_exit: Option<GeofenceCallback>,
    pub(crate) on_dwell: Option<GeofenceCallback>,
}

impl GeofenceHandlers {
    /// Create an empty handler set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the enter observer.
    pub fn on_enter(mut self, f: impl Fn(&GeofenceEvent) + Send + Sync + 'static) -> Self {
        self.on_enter = Some(Arc::new(f));
        self
    }

    /// Set the exit observer.
    pub fn on_exit(mut self, f: impl Fn(&GeofenceEvent) + Send + Sync + 'static) -> Self {
        self.on_exit = Some(Arc::new(f));
        self
    }

    /// Set the dwell observer. Dwell timers are only armed when one is set.
    pub fn on_dwell(mut self, f: impl Fn(&GeofenceEvent) + Send + Sync + 'static) -> Self {
        self.on_dwell = Some(Arc::new(f));
        self
    }

    /// Whether a dwell observer is configured.
    pub fn has_dwell(&self) -> bool {
        self.on_dwell.is_some()
    }

    /// Invoke the observer matching the event kind, if any.
    pub(crate) fn dispatch(&self, event: &GeofenceEvent) {
        let handler = match event.kind {
            GeofenceEventKind::Enter => &self.on_enter,
            GeofenceEventKind::Exit => &self.on_exit,
            GeofenceEventKind::Dwell => &self.on_dwell,
        };
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

impl fmt::Debug for GeofenceHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeofenceHandlers")
            .field("on_enter", &self.on_enter.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .field("on_dwell", &self.on_dwell.is_some())
            .finish()
    }
}
