//! Queries a provider at each of a segment's search points and deduplicates
//! the results (spec §4.5).

use std::collections::HashMap;

use tracing::warn;

use crate::error::ProviderError;
use crate::geo_utils::haversine;
use crate::models::{PoiCategory, ProviderPoi, RouteSegment};
use crate::providers::GeoProvider;

/// One POI discovered from a segment, with the search point that found it
/// and the straight-line distance from that point (spec §3 `SegmentPOI`).
#[derive(Debug, Clone)]
pub struct PoiDiscovery {
    pub poi: ProviderPoi,
    pub search_point_index: i32,
    pub straight_line_distance_m: i32,
}

/// Searches every search point of `segment`, drops abandoned POIs, and
/// deduplicates by provider id keeping the smallest discovery distance.
/// Per-search-point failures are logged and do not abort the segment
/// (spec §4.5 step 5).
pub async fn search_pois_for_segment(
    provider: &dyn GeoProvider,
    segment: &RouteSegment,
    categories: &[PoiCategory],
    max_distance_m: f64,
) -> Vec<PoiDiscovery> {
    if segment.search_points.is_empty() {
        return Vec::new();
    }

    let mut best: HashMap<String, PoiDiscovery> = HashMap::new();

    for sp in &segment.search_points {
        let result = provider.search_pois(sp.lat, sp.lon, max_distance_m, categories, 20).await;
        let pois = match result {
            Ok(pois) => pois,
            Err(e) => {
                warn!(error = %e, sp_index = sp.index, "POI search failed at search point, continuing");
                continue;
            }
        };

        for poi in pois {
            if poi.is_abandoned() {
                continue;
            }
            let distance_m = haversine(sp.lat, sp.lon, poi.location.lat, poi.location.lon);
            let candidate = PoiDiscovery {
                poi,
                search_point_index: sp.index,
                straight_line_distance_m: distance_m.round() as i32,
            };

            match best.get(&candidate.poi.id) {
                Some(existing) if existing.straight_line_distance_m <= candidate.straight_line_distance_m => {}
                _ => {
                    best.insert(candidate.poi.id.clone(), candidate);
                }
            }
        }
    }

    best.into_values().collect()
}

/// Surfaces the distinction between "no searches attempted" and "every
/// search point attempted failed", for the systemic-failure check in
/// [`crate::road_service`] (spec §7).
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchAttemptTally {
    pub attempted: u32,
    pub failed: u32,
}

impl SearchAttemptTally {
    pub fn record(&mut self, result: &Result<Vec<ProviderPoi>, ProviderError>) {
        self.attempted += 1;
        if result.is_err() {
            self.failed += 1;
        }
    }

    /// Spec §7: abort if 5 consecutive failures, or failure rate > 90% after
    /// at least 5 attempts.
    pub fn is_systemic_failure(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= 5 || (self.attempted >= 5 && self.failed as f64 / self.attempted as f64 > 0.9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn make_provider_poi(id: &str, lat: f64, lon: f64, abandoned: bool) -> ProviderPoi {
        let mut provider_data = StdHashMap::new();
        provider_data.insert("is_abandoned".to_string(), serde_json::json!(abandoned));
        ProviderPoi {
            id: id.to_string(),
            name: Some("Test POI".to_string()),
            category: PoiCategory::GasStation,
            location: crate::models::Coordinate::new(lat, lon),
            city: None,
            operator: None,
            brand: None,
            opening_hours: None,
            phone: None,
            website: None,
            cuisine: None,
            amenities: vec![],
            rating: None,
            review_count: None,
            provider_data,
        }
    }

    #[test]
    fn abandoned_flag_is_detected_on_provider_poi() {
        let poi = make_provider_poi("node/1", 0.0, 0.0, true);
        assert!(poi.is_abandoned());
        let poi = make_provider_poi("node/2", 0.0, 0.0, false);
        assert!(!poi.is_abandoned());
    }

    #[test]
    fn systemic_failure_triggers_on_five_consecutive() {
        let tally = SearchAttemptTally { attempted: 5, failed: 1 };
        assert!(tally.is_systemic_failure(5));
        assert!(!tally.is_systemic_failure(4));
    }

    #[test]
    fn systemic_failure_triggers_on_ninety_percent_rate() {
        let tally = SearchAttemptTally { attempted: 10, failed: 10 };
        assert!(tally.is_systemic_failure(0));
        let tally = SearchAttemptTally { attempted: 10, failed: 8 };
        assert!(!tally.is_systemic_failure(0));
    }
}
