//! SiteWatch CLI - Command-line interface
//!
//! Replays recorded tracks against a site catalog, answers point proximity
//! queries and manages the configuration file.

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use sitewatch::config::ConfigFile;
use sitewatch::logging;

use commands::check::{CheckArgs, DistanceArgs};
use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "sitewatch", version, about = "Geofence proximity monitoring for field site visits")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a recorded position track against a site catalog
    Replay {
        /// Site catalog (JSON array of {id, name, latitude, longitude})
        #[arg(long)]
        sites: PathBuf,

        /// Recorded track (JSON array of fixes and errors)
        #[arg(long)]
        track: PathBuf,

        /// Playback speed factor
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Seconds at a site before the dwell reminder [default: sites.dwell_time_secs]
        #[arg(long)]
        dwell_secs: Option<u64>,

        /// Geofence radius around each site in meters [default: sites.radius_m]
        #[arg(long)]
        radius: Option<f64>,

        /// Keep monitoring this many seconds after the track ends
        #[arg(long, default_value_t = 0)]
        hold_secs: u64,

        /// Do not schedule arrival notifications
        #[arg(long)]
        no_notifications: bool,

        /// Simulate a user who refuses location access
        #[arg(long)]
        denied: bool,
    },

    /// List the sites containing a point, with distances to nearby sites
    #[command(allow_negative_numbers = true)]
    Check {
        /// Site catalog (JSON array of {id, name, latitude, longitude})
        #[arg(long)]
        sites: PathBuf,

        /// Geofence radius around each site in meters [default: sites.radius_m]
        #[arg(long)]
        radius: Option<f64>,

        /// Latitude in decimal degrees
        latitude: f64,

        /// Longitude in decimal degrees
        longitude: f64,
    },

    /// Great-circle distance between two points
    #[command(allow_negative_numbers = true)]
    Distance {
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    },

    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    // Config commands must work even when the file is broken
    if let Commands::Config { command } = cli.command {
        return commands::config::run(command);
    }

    let config = ConfigFile::load()?;
    let level = logging::level_for_verbosity(cli.verbose, &config.logging.level);
    let _log_guard = logging::init(&level, config.logging.file.as_deref())?;

    match cli.command {
        Commands::Replay {
            sites,
            track,
            speed,
            dwell_secs,
            radius,
            hold_secs,
            no_notifications,
            denied,
        } => commands::replay::run(
            ReplayArgs {
                sites,
                track,
                speed,
                dwell_secs,
                radius,
                hold_secs,
                notifications: !no_notifications,
                denied,
            },
            &config,
        ),
        Commands::Check {
            sites,
            radius,
            latitude,
            longitude,
        } => commands::check::run_check(
            CheckArgs {
                sites,
                radius,
                latitude,
                longitude,
            },
            &config,
        ),
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => commands::check::run_distance(DistanceArgs {
            from: (lat1, lon1),
            to: (lat2, lon2),
        }),
        Commands::Config { .. } => Ok(()),
    }
}
