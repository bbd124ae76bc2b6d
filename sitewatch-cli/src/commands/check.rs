//! Point queries - which sites contain a position, and plain distances.

use std::path::PathBuf;

use sitewatch::config::ConfigFile;
use sitewatch::geo::{format_distance, haversine_distance};
use sitewatch::geofence::MembershipSnapshot;
use sitewatch::site::{load_sites, site_regions};

use crate::error::CliError;

/// Arguments for the check command.
pub struct CheckArgs {
    pub sites: PathBuf,
    pub radius: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Arguments for the distance command.
pub struct DistanceArgs {
    pub from: (f64, f64),
    pub to: (f64, f64),
}

fn validate_point(latitude: f64, longitude: f64) -> Result<(), CliError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(CliError::InvalidInput(format!(
            "Coordinates out of range: {}, {}",
            latitude, longitude
        )));
    }
    Ok(())
}

/// Run the check command.
pub fn run_check(args: CheckArgs, config: &ConfigFile) -> Result<(), CliError> {
    validate_point(args.latitude, args.longitude)?;
    let radius = args.radius.unwrap_or(config.sites.radius_m);

    let sites = load_sites(&args.sites)?;
    let regions = site_regions(&sites, radius);
    let snapshot = MembershipSnapshot::evaluate(&regions, args.latitude, args.longitude);

    println!(
        "Position {:.5}, {:.5} against {} sites (radius {})",
        args.latitude,
        args.longitude,
        regions.len(),
        format_distance(radius)
    );
    println!();

    if snapshot.inside.is_empty() {
        println!("Inside: (none)");
    } else {
        println!("Inside:");
        for region in &snapshot.inside {
            let distance = region.distance_from(args.latitude, args.longitude);
            println!("  {} ({}) - {}", region.name, region.id, format_distance(distance));
        }
    }

    if !snapshot.nearby.is_empty() {
        println!("Nearby:");
        for entry in &snapshot.nearby {
            println!(
                "  {} ({}) - {}",
                entry.region.name,
                entry.region.id,
                format_distance(entry.distance)
            );
        }
    }

    let nearest = regions
        .iter()
        .map(|region| (region, region.distance_from(args.latitude, args.longitude)))
        .filter(|(_, distance)| distance.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((region, distance)) = nearest {
        println!();
        println!("Nearest site: {} ({})", region.name, format_distance(distance));
    }

    Ok(())
}

/// Run the distance command.
pub fn run_distance(args: DistanceArgs) -> Result<(), CliError> {
    let (lat1, lon1) = args.from;
    let (lat2, lon2) = args.to;
    validate_point(lat1, lon1)?;
    validate_point(lat2, lon2)?;

    let meters = haversine_distance(lat1, lon1, lat2, lon2);
    println!("{:.1} m ({})", meters, format_distance(meters));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_point() {
        assert!(validate_point(15.5, 32.56).is_ok());
        assert!(validate_point(-90.0, 180.0).is_ok());
        assert!(validate_point(91.0, 0.0).is_err());
        assert!(validate_point(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_check_reads_sites() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sites.json");
        std::fs::write(
            &path,
            r#"[{"id": "s1", "name": "Clinic", "latitude": 15.5, "longitude": 32.56}]"#,
        )
        .unwrap();

        let args = CheckArgs {
            sites: path,
            radius: None,
            latitude: 15.5,
            longitude: 32.56,
        };
        assert!(run_check(args, &ConfigFile::default()).is_ok());

        let missing = CheckArgs {
            sites: dir.path().join("missing.json"),
            radius: None,
            latitude: 0.0,
            longitude: 0.0,
        };
        assert!(matches!(
            run_check(missing, &ConfigFile::default()),
            Err(CliError::Sites(_))
        ));
    }
}
