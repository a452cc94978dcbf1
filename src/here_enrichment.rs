//! Second-pass enrichment of OSM-discovered POIs with HERE contact/hours
//! data, keyed by proximity + name similarity (spec §4.10 step 6).

use std::collections::HashSet;

use sqlx::PgPool;
use tracing::{debug, warn};

use crate::geo_utils::haversine;
use crate::models::{Poi, ProviderPoi, ENRICHABLE_CATEGORIES};
use crate::providers::here::HereProvider;
use crate::providers::GeoProvider;

const SEARCH_RADIUS_M: f64 = 200.0;
const MATCH_THRESHOLD: f64 = 0.3;
const CLOSE_ENOUGH_M: f64 = 50.0;
const MAX_SCORING_DISTANCE_M: f64 = 500.0;

fn normalize_name(name: &str) -> HashSet<String> {
    name.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn name_score(a: &str, b: &str) -> f64 {
    let tokens_a = normalize_name(a);
    let tokens_b = normalize_name(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn distance_score(distance_m: f64) -> f64 {
    (1.0 - (distance_m / MAX_SCORING_DISTANCE_M)).clamp(0.0, 1.0)
}

/// `0.4 * name_score + 0.6 * distance_score` (spec §4.10 step 6).
fn match_score(poi_name: Option<&str>, candidate_name: Option<&str>, distance_m: f64) -> f64 {
    let name = match (poi_name, candidate_name) {
        (Some(a), Some(b)) => name_score(a, b),
        _ => 0.0,
    };
    0.4 * name + 0.6 * distance_score(distance_m)
}

fn best_match<'a>(poi: &Poi, candidates: &'a [ProviderPoi]) -> Option<(&'a ProviderPoi, f64)> {
    candidates
        .iter()
        .map(|candidate| {
            let distance_m = haversine(poi.latitude, poi.longitude, candidate.location.lat, candidate.location.lon);
            (candidate, match_score(poi.name.as_deref(), candidate.name.as_deref(), distance_m), distance_m)
        })
        .filter(|(_, score, distance_m)| *score >= MATCH_THRESHOLD || *distance_m < CLOSE_ENOUGH_M)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(candidate, score, _)| (candidate, score))
}

/// Enriches every enrichable canonical POI in `pois` with HERE contact
/// details, updating `pois` and the database in place. Failures for an
/// individual POI are logged and skipped — enrichment never aborts the
/// pipeline (spec §7, "cache/enrichment errors are non-fatal").
pub async fn enrich_pois(pool: &PgPool, here: &HereProvider, pois: &mut [Poi]) {
    for poi in pois.iter_mut() {
        if !ENRICHABLE_CATEGORIES.contains(&poi.category) {
            continue;
        }
        if poi.enriched_by.contains("here") {
            continue;
        }

        let candidates = match here
            .search_pois(poi.latitude, poi.longitude, SEARCH_RADIUS_M, &[poi.category], 10)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, poi_id = %poi.id, "HERE enrichment search failed, skipping POI");
                continue;
            }
        };

        let Some((best, score)) = best_match(poi, &candidates) else {
            continue;
        };
        debug!(poi_id = %poi.id, score, "HERE enrichment match found");

        poi.phone = poi.phone.clone().or_else(|| best.phone.clone());
        poi.website = poi.website.clone().or_else(|| best.website.clone());
        poi.opening_hours = poi.opening_hours.clone().or_else(|| best.opening_hours.clone());
        poi.enriched_by.insert("here".to_string());

        if let Err(e) = crate::db::pois::update_observed_fields(pool, poi).await {
            warn!(error = %e, poi_id = %poi.id, "failed to persist HERE enrichment");
            continue;
        }
        if let Err(e) = crate::db::pois::add_enrichment_source(pool, poi.id, "here").await {
            warn!(error = %e, poi_id = %poi.id, "failed to record enrichment source");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_score_one() {
        assert!((name_score("Posto Ipiranga", "posto ipiranga") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn distance_score_decays_to_zero_at_max_range() {
        assert!((distance_score(0.0) - 1.0).abs() < 1e-9);
        assert_eq!(distance_score(MAX_SCORING_DISTANCE_M), 0.0);
        assert_eq!(distance_score(MAX_SCORING_DISTANCE_M * 2.0), 0.0);
    }

    #[test]
    fn match_score_blends_name_and_distance() {
        let score = match_score(Some("Posto Shell"), Some("Posto Shell"), 0.0);
        assert!((score - 1.0).abs() < 1e-9);

        let score = match_score(Some("Posto Shell"), Some("Unrelated Cafe"), 0.0);
        assert!((score - 0.6).abs() < 1e-9); // distance-only contribution
    }
}
