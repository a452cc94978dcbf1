//! The user-visible linear map and its bindings to segments and POIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::poi::PoiCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Center,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Center => "center",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub total_length_km: f64,
    pub road_id: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
}

/// An ordered binding of a segment to a map (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSegment {
    pub map_id: Uuid,
    pub segment_id: Uuid,
    pub sequence_order: i32,
    pub distance_from_origin_km: f64,
}

/// A POI bound to a map with all contextual calculations resolved (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapPoi {
    pub map_id: Uuid,
    pub poi_id: Uuid,
    pub segment_index: i32,
    pub distance_from_origin_km: f64,
    pub distance_from_road_meters: f64,
    pub side: Side,
    pub junction_lat: f64,
    pub junction_lon: f64,
    pub junction_distance_km: f64,
    pub requires_detour: bool,
    pub quality_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapStatistics {
    pub segment_count: usize,
    pub poi_count: usize,
    pub pois_by_type: std::collections::HashMap<PoiCategory, usize>,
    pub pois_by_side: std::collections::HashMap<String, usize>,
    pub total_distance_km: f64,
}
