//! Content-addressed, reusable route segments and their discovery records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchPoint {
    pub index: i32,
    pub lat: f64,
    pub lon: f64,
    pub distance_from_segment_start_km: f64,
}

/// A reusable, content-addressed slice of a route (spec §3/§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub id: Uuid,
    pub segment_hash: String,
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    pub length_km: f64,
    pub road_name: Option<String>,
    pub geometry: Vec<(f64, f64)>,
    pub search_points: Vec<SearchPoint>,
    pub usage_count: i64,
    pub pois_fetched_at: Option<DateTime<Utc>>,
}

impl RouteSegment {
    pub fn needs_poi_search(&self) -> bool {
        self.pois_fetched_at.is_none() && self.length_km >= 1.0
    }
}

/// Binds a discovered POI to the segment that found it (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentPoi {
    pub segment_id: Uuid,
    pub poi_id: Uuid,
    pub search_point_index: i32,
    pub straight_line_distance_m: i32,
}
