//! SiteWatch - Geofence proximity monitoring for field site visits
//!
//! This library watches a stream of device positions against circular regions
//! around field sites, reporting arrivals, departures and extended stays.
//!
//! - [`geo`] - Great-circle distance
//! - [`geofence`] - Proximity engine and its collaborator traits
//! - [`site`] - Site catalog to region mapping and the site visit monitor
//! - [`replay`] - Position source that plays back a recorded track
//! - [`config`] - INI configuration file
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod geo;
pub mod geofence;
pub mod logging;
pub mod replay;
pub mod site;
