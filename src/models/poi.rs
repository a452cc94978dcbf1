//! Canonical, provider-agnostic POI representation.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiCategory {
    GasStation,
    Restaurant,
    Hotel,
    Hospital,
    Pharmacy,
    Bank,
    Atm,
    Cafe,
    FastFood,
    Supermarket,
    Mechanic,
    City,
    Town,
    Services,
    Other,
}

impl std::fmt::Display for PoiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).unwrap_or(Value::Null);
        write!(f, "{}", s.as_str().unwrap_or("other"))
    }
}

/// Categories [`crate::here_enrichment`] is allowed to enrich, per spec §4.10 step 6.
pub const ENRICHABLE_CATEGORIES: &[PoiCategory] = &[
    PoiCategory::GasStation,
    PoiCategory::Restaurant,
    PoiCategory::Hotel,
    PoiCategory::Hospital,
    PoiCategory::Pharmacy,
    PoiCategory::Bank,
    PoiCategory::Atm,
    PoiCategory::Cafe,
    PoiCategory::FastFood,
    PoiCategory::Supermarket,
    PoiCategory::Mechanic,
];

/// Quality signal attached during provider-side scoring (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    MissingName,
    MissingBrand,
    LowScore,
    MissingContact,
    MissingHours,
    Abandoned,
}

/// A POI exactly as returned by a provider adapter, before it has been
/// merged into the canonical `pois` table by [`crate::poi_persistence`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPoi {
    /// Provider-native ID, e.g. `"node/12345"` for OSM or a HERE place id.
    pub id: String,
    pub name: Option<String>,
    pub category: PoiCategory,
    pub location: Coordinate,
    pub city: Option<String>,
    pub operator: Option<String>,
    pub brand: Option<String>,
    pub opening_hours: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub cuisine: Option<String>,
    pub amenities: Vec<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    /// Opaque provider-specific tag bag (OSM tags, HERE attributes, ...);
    /// also where `here_id`, `quality_score`, `quality_issues`,
    /// `is_low_quality`, and `is_abandoned` are stashed by the adapter.
    pub provider_data: HashMap<String, Value>,
}

impl ProviderPoi {
    pub fn quality_score(&self) -> f64 {
        self.provider_data
            .get("quality_score")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }

    pub fn is_low_quality(&self) -> bool {
        self.provider_data
            .get("is_low_quality")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn is_abandoned(&self) -> bool {
        self.provider_data
            .get("is_abandoned")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn here_id(&self) -> Option<&str> {
        self.provider_data.get("here_id").and_then(|v| v.as_str())
    }
}

/// The canonical, deduplicated POI row. At most one row exists per
/// `(provider, provider_id)` pair (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poi {
    pub id: Uuid,
    pub osm_id: Option<String>,
    pub here_id: Option<String>,
    pub google_place_id: Option<String>,
    pub name: Option<String>,
    pub category: PoiCategory,
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub operator: Option<String>,
    pub brand: Option<String>,
    pub opening_hours: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub cuisine: Option<String>,
    pub amenities: BTreeSet<String>,
    pub tags: Value,
    pub quality_score: f64,
    pub quality_issues: Vec<QualityIssue>,
    pub is_low_quality: bool,
    pub is_disabled: bool,
    pub is_referenced: bool,
    pub enriched_by: BTreeSet<String>,
}

impl Poi {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// The provider + provider-native id pair that identifies a POI's origin,
/// extracted per spec's supplemented `_extract_provider_info` (SPEC_FULL §B.7).
pub fn extract_provider_info(poi: &ProviderPoi) -> (&'static str, String) {
    if let Some(here_id) = poi.here_id() {
        return ("here", here_id.to_string());
    }
    if let Some(prefix) = poi.id.split('/').next() {
        if matches!(prefix, "node" | "way" | "relation") {
            return ("osm", poi.id.clone());
        }
    }
    ("osm", poi.id.clone())
}
