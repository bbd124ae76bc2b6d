//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` commands
//! for viewing and modifying configuration settings from the command line.

use clap::Subcommand;
use sitewatch::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., sites.radius_m)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., geofence.dwell_time_secs)
        key: String,

        /// Value to set (an empty string clears optional settings)
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'sitewatch config list' to see available keys.",
            key
        ))
    })
}

/// Get a configuration value.
fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load()?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }

    Ok(())
}

/// Set a configuration value.
///
/// A broken file is replaced by defaults plus the new value rather than
/// blocking the fix.
fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = ConfigFile::load().unwrap_or_else(|e| {
        eprintln!("Warning: {}. Starting from defaults.", e);
        ConfigFile::default()
    });
    config_key.set(&mut config, value)?;
    config.save()?;

    println!("Set {} = {}", config_key.name(), config_key.get(&config));

    Ok(())
}

/// Heading printed above each section in `config list`.
fn section_title(section: &str) -> &'static str {
    match section {
        "geofence" => "Geofence monitoring",
        "position" => "Position fixes",
        "sites" => "Site regions",
        "logging" => "Logging",
        _ => "Other",
    }
}

/// One `config list` line: value with its unit, then the description.
fn format_setting(key: ConfigKey, value: &str) -> String {
    let shown = match (value.is_empty(), key.unit()) {
        (true, _) => "(not set)".to_string(),
        (false, Some(unit)) => format!("{} {}", value, unit),
        (false, None) => value.to_string(),
    };
    format!("  {:<22} {:<12} # {}", key.key_name(), shown, key.description())
}

/// List all configuration settings, grouped by section.
fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;

    println!("SiteWatch settings ({})", config_file_path().display());

    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            println!();
            println!("{} [{}]", section_title(section), section);
            current_section = section;
        }
        println!("{}", format_setting(*key, &key.get(&config)));
    }

    Ok(())
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
