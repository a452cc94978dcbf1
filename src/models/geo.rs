//! Provider-agnostic geographic types: locations, routes, route steps.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A geocoded location, optionally annotated with the structured city/state
/// extracted from the provider's address breakdown (not parsed from a
/// free-text string — see spec §4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl GeoLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A single OSRM maneuver step, the raw unit that [`crate::segment_engine`]
/// turns into a reusable [`crate::models::segment::RouteSegment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub start_coords: (f64, f64),
    pub end_coords: (f64, f64),
    pub distance_km: f64,
    pub duration_s: f64,
    pub geometry: Vec<(f64, f64)>,
    pub road_name: Option<String>,
    pub maneuver_type: Option<String>,
}

/// A complete route as returned by a routing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub total_distance_km: f64,
    pub total_duration_min: f64,
    pub geometry: Vec<(f64, f64)>,
    pub steps: Vec<RouteStep>,
    pub road_names: Vec<String>,
}
