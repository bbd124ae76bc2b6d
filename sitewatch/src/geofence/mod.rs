//! Geofence proximity engine
//!
//! Watches a stream of device positions against a catalog of circular regions
//! and reports when the device enters, leaves, or lingers in one of them.
//!
//! # Design Philosophy
//!
//! **Membership is recomputed, transitions are derived.**
//!
//! - **Recompute**: Every fix re-evaluates all regions from scratch
//! - **Diff**: Enter/exit come from comparing with the previous fix
//! - **Time**: Dwell is a per-region timer armed on enter, cancelled on exit
//!
//! Platform concerns (location services, notifications, UI toasts, the
//! diagnostic audit trail) are traits, so the engine runs the same against a
//! real device, a recorded track, or a test double.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sitewatch::geofence::{GeofenceConfig, GeofenceRegion, ProximityEngine};
//! use sitewatch::replay::ReplayPositionSource;
//!
//! let source = Arc::new(ReplayPositionSource::new(track));
//! let engine = ProximityEngine::builder(source)
//!     .regions(vec![GeofenceRegion::new("s1", "Clinic", 15.5, 32.56, 100.0)])
//!     .config(GeofenceConfig::default())
//!     .on_enter(|e| println!("entered {}", e.region.name))
//!     .on_exit(|e| println!("left {}", e.region.name))
//!     .build();
//!
//! engine.start_monitoring().await?;
//! ```

mod builder;
mod config;
mod dwell;
mod engine;
mod error;
mod event;
mod membership;
mod position;
mod region;
mod sinks;

pub use builder::ProximityEngineBuilder;
pub use config::{
    GeofenceConfig, DEFAULT_CHECK_INTERVAL, DEFAULT_DWELL_TIME, DEFAULT_EVENT_CHANNEL_CAPACITY,
};
pub use dwell::DwellTimers;
pub use engine::{ProximityEngine, DEFAULT_SEARCH_DISTANCE_M};
pub use error::GeofenceError;
pub use event::{GeofenceCallback, GeofenceEvent, GeofenceEventKind, GeofenceHandlers};
pub use membership::{MembershipSnapshot, MembershipTracker, Transitions};
pub use position::{
    BoxFuture, PermissionStatus, PositionError, PositionReceiver, PositionSample,
    PositionSender, PositionSource, PositionUpdate, WatchId, WatchOptions, DEFAULT_MAXIMUM_AGE,
    DEFAULT_WATCH_TIMEOUT,
};
pub use region::{GeofenceRegion, NearbyRegion};
pub use sinks::{
    DiagnosticLog, LogLevel, LogNotifications, LogToasts, Notification, NotificationError,
    NotificationSink, Toast, ToastSink, ToastVariant, TracingDiagnostics,
};
