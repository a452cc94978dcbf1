//! Maps provider POIs to canonical `Poi` rows, with update-in-place on
//! coordinate drift and `is_referenced` tracking (spec §3/§4.7).

use std::collections::BTreeSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{extract_provider_info, Poi, ProviderPoi};

/// Looks up the canonical POI by `(provider, provider_id)`; if found and the
/// observed coordinates/attributes drifted, updates in place (Open Question
/// 1, SPEC_FULL §C.1). If not found, inserts a new row.
pub async fn get_or_create_by_provider_id(pool: &PgPool, provider_poi: &ProviderPoi) -> Result<Poi, sqlx::Error> {
    let (provider, provider_id) = extract_provider_info(provider_poi);

    if let Some(existing) = crate::db::pois::find_by_provider_id(pool, provider, &provider_id).await? {
        let merged = merge_observed_fields(existing, provider_poi);
        return crate::db::pois::update_observed_fields(pool, &merged).await;
    }

    let poi = new_canonical_poi(provider_poi, provider, &provider_id);
    crate::db::pois::insert(pool, &poi).await
}

fn new_canonical_poi(provider_poi: &ProviderPoi, provider: &str, provider_id: &str) -> Poi {
    let amenities: BTreeSet<String> = provider_poi.amenities.iter().cloned().collect();

    Poi {
        id: Uuid::new_v4(),
        osm_id: (provider == "osm").then(|| provider_id.to_string()),
        here_id: (provider == "here").then(|| provider_id.to_string()),
        google_place_id: (provider == "google").then(|| provider_id.to_string()),
        name: provider_poi.name.clone(),
        category: provider_poi.category,
        latitude: provider_poi.location.lat,
        longitude: provider_poi.location.lon,
        city: provider_poi.city.clone(),
        operator: provider_poi.operator.clone(),
        brand: provider_poi.brand.clone(),
        opening_hours: provider_poi.opening_hours.clone(),
        phone: provider_poi.phone.clone(),
        website: provider_poi.website.clone(),
        cuisine: provider_poi.cuisine.clone(),
        amenities,
        tags: serde_json::to_value(&provider_poi.provider_data).unwrap_or(serde_json::Value::Null),
        quality_score: provider_poi.quality_score(),
        quality_issues: provider_poi
            .provider_data
            .get("quality_issues")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        is_low_quality: provider_poi.is_low_quality(),
        is_disabled: false,
        is_referenced: false,
        enriched_by: BTreeSet::new(),
    }
}

fn merge_observed_fields(mut existing: Poi, provider_poi: &ProviderPoi) -> Poi {
    existing.name = provider_poi.name.clone().or(existing.name);
    existing.latitude = provider_poi.location.lat;
    existing.longitude = provider_poi.location.lon;
    existing.city = provider_poi.city.clone().or(existing.city);
    existing.operator = provider_poi.operator.clone().or(existing.operator);
    existing.brand = provider_poi.brand.clone().or(existing.brand);
    existing.opening_hours = provider_poi.opening_hours.clone().or(existing.opening_hours);
    existing.phone = provider_poi.phone.clone().or(existing.phone);
    existing.website = provider_poi.website.clone().or(existing.website);
    existing.cuisine = provider_poi.cuisine.clone().or(existing.cuisine);
    existing.amenities.extend(provider_poi.amenities.iter().cloned());
    existing.quality_score = provider_poi.quality_score();
    existing.is_low_quality = provider_poi.is_low_quality();
    if let Some(tags) = serde_json::to_value(&provider_poi.provider_data).ok() {
        existing.tags = tags;
    }
    existing
}

pub async fn mark_referenced(pool: &PgPool, poi_id: Uuid) -> Result<(), sqlx::Error> {
    crate::db::pois::set_referenced(pool, poi_id, true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, PoiCategory};
    use std::collections::HashMap;

    fn provider_poi(id: &str) -> ProviderPoi {
        ProviderPoi {
            id: id.to_string(),
            name: Some("Posto Ipiranga".to_string()),
            category: PoiCategory::GasStation,
            location: Coordinate::new(-19.9, -43.9),
            city: Some("Belo Horizonte".to_string()),
            operator: None,
            brand: Some("Ipiranga".to_string()),
            opening_hours: None,
            phone: None,
            website: None,
            cuisine: None,
            amenities: vec!["fuel".to_string()],
            rating: None,
            review_count: None,
            provider_data: HashMap::new(),
        }
    }

    #[test]
    fn osm_node_prefix_resolves_to_osm_provider() {
        let poi = provider_poi("node/123");
        let (provider, id) = extract_provider_info(&poi);
        assert_eq!(provider, "osm");
        assert_eq!(id, "node/123");

        let canonical = new_canonical_poi(&poi, provider, &id);
        assert_eq!(canonical.osm_id.as_deref(), Some("node/123"));
        assert!(canonical.here_id.is_none());
    }

    #[test]
    fn merge_keeps_newly_observed_coordinates() {
        let existing = new_canonical_poi(&provider_poi("node/5"), "osm", "node/5");
        let mut drifted = provider_poi("node/5");
        drifted.location = Coordinate::new(-20.0, -44.0);
        let merged = merge_observed_fields(existing, &drifted);
        assert_eq!(merged.latitude, -20.0);
        assert_eq!(merged.longitude, -44.0);
    }
}
