//! Replay command - run site monitoring over a recorded track.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sitewatch::config::ConfigFile;
use sitewatch::geo::format_distance;
use sitewatch::geofence::{GeofenceEventKind, PermissionStatus, PositionSource};
use sitewatch::replay::{load_track, ReplayPositionSource, MIN_SPEED};
use sitewatch::site::{load_sites, SiteProximity};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CliError;
use crate::output::{format_event, ConsoleNotifications, ConsoleToasts};

/// How often playback completion is polled.
const PLAYBACK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub sites: PathBuf,
    pub track: PathBuf,
    pub speed: f64,
    pub dwell_secs: Option<u64>,
    pub radius: Option<f64>,
    pub hold_secs: u64,
    pub notifications: bool,
    pub denied: bool,
}

#[derive(Debug, Default)]
struct ReplaySummary {
    enters: usize,
    exits: usize,
    dwells: usize,
}

impl ReplaySummary {
    fn record(&mut self, kind: GeofenceEventKind) {
        match kind {
            GeofenceEventKind::Enter => self.enters += 1,
            GeofenceEventKind::Exit => self.exits += 1,
            GeofenceEventKind::Dwell => self.dwells += 1,
        }
    }
}

fn validate_speed(speed: f64) -> Result<(), CliError> {
    if !speed.is_finite() || speed < MIN_SPEED {
        return Err(CliError::InvalidInput(format!(
            "Playback speed must be at least {}, got {}",
            MIN_SPEED, speed
        )));
    }
    Ok(())
}

/// Run the replay command.
pub fn run(args: ReplayArgs, config: &ConfigFile) -> Result<(), CliError> {
    validate_speed(args.speed)?;
    let radius = args.radius.unwrap_or(config.sites.radius_m);
    if !radius.is_finite() || radius <= 0.0 {
        return Err(CliError::InvalidInput(format!(
            "Radius must be a positive number of meters, got {}",
            radius
        )));
    }

    let sites = load_sites(&args.sites)?;
    let track = load_track(&args.track)?;

    let mut geofence = config
        .site_geofence_config()
        .with_notifications(args.notifications);
    if let Some(secs) = args.dwell_secs {
        geofence = geofence.with_dwell_time(Duration::from_secs(secs));
    }

    println!("SiteWatch Track Replay v{}", env!("CARGO_PKG_VERSION"));
    println!("========================");
    println!();
    println!("Sites:  {} ({} in catalog)", args.sites.display(), sites.len());
    println!("Track:  {} ({} entries)", args.track.display(), track.len());
    println!("Radius: {}", format_distance(radius));
    println!("Dwell:  {}s", geofence.dwell_time.as_secs());
    println!("Speed:  {}x", args.speed);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let permission = if args.denied {
        PermissionStatus::Denied
    } else {
        PermissionStatus::Granted
    };
    let source = Arc::new(
        ReplayPositionSource::new(track)
            .with_speed(args.speed)
            .with_permission(permission),
    );

    let shutdown = CancellationToken::new();
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        shutdown_handler.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    runtime.block_on(async move {
        let proximity = SiteProximity::builder(Arc::clone(&source) as Arc<dyn PositionSource>)
            .sites(&sites)
            .radius(radius)
            .config(geofence)
            .toasts(Arc::new(ConsoleToasts))
            .notifications(Arc::new(ConsoleNotifications))
            .build();

        let mut events = proximity.subscribe();
        proximity.start_monitoring().await?;

        let mut summary = ReplaySummary::default();
        let mut poll = tokio::time::interval(PLAYBACK_POLL_INTERVAL);
        let mut hold_until: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                event = events.recv() => match event {
                    Ok(event) => {
                        println!("{}", format_event(&event));
                        summary.record(event.kind);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Event printer fell behind");
                    }
                    Err(RecvError::Closed) => break,
                },

                _ = poll.tick() => {
                    if source.active_watches() > 0 {
                        continue;
                    }
                    let deadline = *hold_until.get_or_insert_with(|| {
                        info!(hold_secs = args.hold_secs, "Track finished");
                        tokio::time::Instant::now() + Duration::from_secs(args.hold_secs)
                    });
                    if tokio::time::Instant::now() >= deadline {
                        break;
                    }
                }
            }
        }

        // Drain anything emitted just before the loop ended
        while let Ok(event) = events.try_recv() {
            println!("{}", format_event(&event));
            summary.record(event.kind);
        }

        let inside = proximity.inside_regions();
        let position = proximity.current_position();
        proximity.stop_monitoring();

        println!();
        println!("Replay Summary");
        println!("──────────────");
        println!(
            "  Events: {} enter, {} exit, {} dwell",
            summary.enters, summary.exits, summary.dwells
        );
        match position {
            Some(p) => println!(
                "  Last position: {:.5}, {:.5} (±{}m)",
                p.latitude, p.longitude, p.accuracy
            ),
            None => println!("  Last position: (none)"),
        }
        if inside.is_empty() {
            println!("  Inside at end: (none)");
        } else {
            let names: Vec<_> = inside.iter().map(|r| r.name.as_str()).collect();
            println!("  Inside at end: {}", names.join(", "));
        }

        Ok::<(), CliError>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_by_kind() {
        let mut summary = ReplaySummary::default();
        summary.record(GeofenceEventKind::Enter);
        summary.record(GeofenceEventKind::Dwell);
        summary.record(GeofenceEventKind::Exit);
        summary.record(GeofenceEventKind::Enter);

        assert_eq!(summary.enters, 2);
        assert_eq!(summary.exits, 1);
        assert_eq!(summary.dwells, 1);
    }

    #[test]
    fn test_rejects_invalid_speed() {
        let args = ReplayArgs {
            sites: PathBuf::from("sites.json"),
            track: PathBuf::from("track.json"),
            speed: 0.0,
            dwell_secs: None,
            radius: None,
            hold_secs: 0,
            notifications: true,
            denied: false,
        };

        let err = run(args, &ConfigFile::default()).unwrap_err();
        assert!(matches!(err, CliError::InvalidInput(_)));
    }

    #[test]
    fn test_speed_below_playback_floor() {
        // Would otherwise be ignored by the source and play at 1x
        assert!(matches!(validate_speed(0.005), Err(CliError::InvalidInput(_))));
        assert!(validate_speed(f64::INFINITY).is_err());
        assert!(validate_speed(MIN_SPEED).is_ok());
        assert!(validate_speed(10.0).is_ok());
    }
}
