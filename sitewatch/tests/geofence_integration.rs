//! Integration tests for the proximity engine driven by recorded tracks.
//!
//! These tests run the engine end to end against `ReplayPositionSource`:
//! - Track file → position stream → enter/exit/dwell events
//! - Site catalog → site monitor toasts
//! - Stop and permission handling as seen from the outside
//!
//! Run with: `cargo test --test geofence_integration`

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tempfile::NamedTempFile;

use sitewatch::geo::haversine_distance;
use sitewatch::geofence::{
    DiagnosticLog, GeofenceError, GeofenceEventKind, GeofenceRegion, LogLevel, PermissionStatus,
    PositionSource, ProximityEngine, Toast, ToastSink,
};
use sitewatch::replay::{load_track, ReplayPositionSource, TrackEntry};
use sitewatch::site::{load_sites, SiteProximity};

// ============================================================================
// Helper Functions
// ============================================================================

type EventLog = Arc<Mutex<Vec<(GeofenceEventKind, String)>>>;

#[derive(Default)]
struct RecordingToasts(Mutex<Vec<Toast>>);

impl ToastSink for RecordingToasts {
    fn show(&self, toast: Toast) {
        self.0.lock().push(toast);
    }
}

#[derive(Default)]
struct RecordingDiagnostics(Mutex<Vec<(LogLevel, String)>>);

impl DiagnosticLog for RecordingDiagnostics {
    fn log(&self, level: LogLevel, message: &str, _context: Option<&Value>) {
        self.0.lock().push((level, message.to_string()));
    }
}

fn site_a() -> GeofenceRegion {
    GeofenceRegion::new("A", "Site A", 15.50, 32.56, 100.0)
}

fn site_b() -> GeofenceRegion {
    GeofenceRegion::new("B", "Site B", 19.60, 37.20, 100.0)
}

/// Build an engine that records every event into the returned log.
fn recording_engine(source: Arc<ReplayPositionSource>, regions: Vec<GeofenceRegion>) -> (ProximityEngine, EventLog) {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let enters = Arc::clone(&log);
    let exits = Arc::clone(&log);
    let dwells = Arc::clone(&log);

    let engine = ProximityEngine::builder(source as Arc<dyn PositionSource>)
        .regions(regions)
        .on_enter(move |e| enters.lock().push((e.kind, e.region.id.clone())))
        .on_exit(move |e| exits.lock().push((e.kind, e.region.id.clone())))
        .on_dwell(move |e| dwells.lock().push((e.kind, e.region.id.clone())))
        .toasts(Arc::new(RecordingToasts::default()))
        .diagnostics(Arc::new(RecordingDiagnostics::default()))
        .build();

    (engine, log)
}

fn write_json(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Device starts at A, drifts to its edge, travels, and arrives at B.
#[tokio::test(start_paused = true)]
async fn test_two_region_pass_through() {
    let source = Arc::new(ReplayPositionSource::new(vec![
        TrackEntry::fix(15.50, 32.56),
        TrackEntry::fix(15.5009, 32.5599),
        TrackEntry::fix(16.0, 33.0),
        TrackEntry::fix(19.60, 37.20),
    ]));
    let (engine, log) = recording_engine(Arc::clone(&source), vec![site_a(), site_b()]);

    engine.start_monitoring().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(
        *log.lock(),
        vec![
            (GeofenceEventKind::Enter, "A".to_string()),
            (GeofenceEventKind::Exit, "A".to_string()),
            (GeofenceEventKind::Enter, "B".to_string()),
        ]
    );
    let inside: Vec<_> = engine.inside_regions().into_iter().map(|r| r.id).collect();
    assert_eq!(inside, vec!["B"]);
    assert!(engine.nearby_regions().is_empty());

    let position = engine.current_position().expect("position after playback");
    assert_eq!((position.latitude, position.longitude), (19.60, 37.20));
}

/// The second fix sits right at A's edge; the exit lands where the
/// `distance <= radius` rule puts it.
#[tokio::test(start_paused = true)]
async fn test_boundary_fix_follows_radius_rule() {
    let boundary = (15.5009, 32.5599);
    let still_inside = haversine_distance(boundary.0, boundary.1, 15.50, 32.56) <= 100.0;

    let source = Arc::new(ReplayPositionSource::new(vec![
        TrackEntry::fix(15.50, 32.56),
        TrackEntry::fix(boundary.0, boundary.1),
    ]));
    let (engine, log) = recording_engine(source, vec![site_a()]);

    engine.start_monitoring().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(engine.is_inside("A"), still_inside);
    let exits = log
        .lock()
        .iter()
        .filter(|(kind, _)| *kind == GeofenceEventKind::Exit)
        .count();
    assert_eq!(exits, usize::from(!still_inside));
}

/// Dwell fires for the region the track ends in, once.
#[tokio::test(start_paused = true)]
async fn test_dwell_after_track_settles() {
    let source = Arc::new(ReplayPositionSource::new(vec![
        TrackEntry::fix(16.0, 33.0),
        TrackEntry::fix(19.60, 37.20),
    ]));
    let (engine, log) = recording_engine(source, vec![site_a(), site_b()]);

    engine.start_monitoring().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(log.lock().len(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        *log.lock(),
        vec![
            (GeofenceEventKind::Enter, "B".to_string()),
            (GeofenceEventKind::Dwell, "B".to_string()),
        ]
    );

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(log.lock().len(), 2);
}

/// GPS errors mid-track leave membership alone.
#[tokio::test(start_paused = true)]
async fn test_delivery_errors_do_not_exit() {
    let source = Arc::new(ReplayPositionSource::new(vec![
        TrackEntry::fix(15.50, 32.56),
        TrackEntry::error("GPS signal lost"),
        TrackEntry::error("GPS signal lost"),
    ]));
    let (engine, log) = recording_engine(source, vec![site_a()]);

    engine.start_monitoring().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(engine.is_inside("A"));
    assert_eq!(log.lock().len(), 1);
}

/// Stopping mid-track releases the playback and fires nothing further.
#[tokio::test(start_paused = true)]
async fn test_stop_mid_track() {
    let source = Arc::new(ReplayPositionSource::new(vec![
        TrackEntry::fix(15.50, 32.56),
        TrackEntry::fix(16.0, 33.0),
        TrackEntry::fix(19.60, 37.20),
    ]));
    let (engine, log) = recording_engine(Arc::clone(&source), vec![site_a(), site_b()]);

    engine.start_monitoring().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(source.active_watches(), 1);

    engine.stop_monitoring();
    assert_eq!(source.active_watches(), 0);
    assert!(engine.inside_regions().is_empty());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(
        *log.lock(),
        vec![(GeofenceEventKind::Enter, "A".to_string())]
    );
}

/// Subscribers see the same sequence as the observers.
#[tokio::test(start_paused = true)]
async fn test_event_subscription() {
    let source = Arc::new(
        ReplayPositionSource::new(vec![
            TrackEntry::fix(15.50, 32.56),
            TrackEntry::fix(16.0, 33.0),
        ])
        .with_speed(10.0),
    );
    let (engine, _log) = recording_engine(source, vec![site_a()]);
    let mut events = engine.subscribe();

    engine.start_monitoring().await.unwrap();

    let enter = events.recv().await.unwrap();
    assert_eq!(enter.kind, GeofenceEventKind::Enter);
    assert_eq!(enter.region, site_a());

    let exit = events.recv().await.unwrap();
    assert_eq!(exit.kind, GeofenceEventKind::Exit);
    assert_eq!(exit.position.latitude, 16.0);
}

/// Denied permission never opens a playback.
#[tokio::test(start_paused = true)]
async fn test_permission_denied() {
    let source = Arc::new(
        ReplayPositionSource::new(vec![TrackEntry::fix(15.50, 32.56)])
            .with_permission(PermissionStatus::Denied),
    );
    let (engine, log) = recording_engine(Arc::clone(&source), vec![site_a()]);

    assert_eq!(
        engine.start_monitoring().await,
        Err(GeofenceError::PermissionDenied)
    );
    assert!(!engine.is_monitoring());
    assert_eq!(source.active_watches(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(log.lock().is_empty());
}

/// Site catalog and track loaded from files, run through the site monitor.
#[tokio::test(start_paused = true)]
async fn test_site_visit_from_files() {
    let sites_file = write_json(
        r#"[
            {"id": "clinic", "name": "Riverside Clinic", "latitude": 15.50, "longitude": 32.56},
            {"id": "depot", "name": "Depot"}
        ]"#,
    );
    let track_file = write_json(
        r#"[
            {"latitude": 15.60, "longitude": 32.56, "delay_ms": 0},
            {"latitude": 15.5003, "longitude": 32.5601, "accuracy": 6},
            {"error": "GPS signal lost", "delay_ms": 500}
        ]"#,
    );

    let sites = load_sites(sites_file.path()).unwrap();
    let track = load_track(track_file.path()).unwrap();
    let source = Arc::new(ReplayPositionSource::new(track));
    let toasts = Arc::new(RecordingToasts::default());
    let diagnostics = Arc::new(RecordingDiagnostics::default());

    let proximity = SiteProximity::builder(source as Arc<dyn PositionSource>)
        .sites(&sites)
        .toasts(Arc::clone(&toasts) as Arc<dyn ToastSink>)
        .diagnostics(Arc::clone(&diagnostics) as Arc<dyn DiagnosticLog>)
        .build();

    proximity.start_monitoring().await.unwrap();
    tokio::time::sleep(Duration::from_secs(305)).await;

    let titles: Vec<_> = toasts.0.lock().iter().map(|t| t.title.clone()).collect();
    assert_eq!(
        titles,
        vec!["Site Monitoring Active", "Site Nearby", "Still at Site"]
    );
    assert_eq!(
        toasts.0.lock()[0].description,
        "Tracking 1 site locations"
    );

    let diagnostics = diagnostics.0.lock();
    assert!(diagnostics
        .iter()
        .any(|(level, msg)| *level == LogLevel::Info && msg == "Entered geofence: Riverside Clinic"));
    assert!(diagnostics
        .iter()
        .any(|(level, msg)| *level == LogLevel::Error && msg == "Geofencing position error"));
    assert!(diagnostics
        .iter()
        .any(|(level, msg)| *level == LogLevel::Info && msg == "Dwelling in geofence: Riverside Clinic"));
}
