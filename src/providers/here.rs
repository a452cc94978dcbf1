//! HERE-backed provider adapter: geocoding, Browse/Lookup POI search, and
//! optional enrichment data source (spec §4.3, §4.10).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::cache::UnifiedCache;
use crate::error::ProviderError;
use crate::models::{Coordinate, GeoLocation, PoiCategory, ProviderKind, ProviderPoi, Route};
use crate::providers::rate_limit::RateLimiter;
use crate::providers::GeoProvider;

const GEOCODE_URL: &str = "https://geocode.search.hereapi.com/v1/geocode";
const REVGEOCODE_URL: &str = "https://revgeocode.search.hereapi.com/v1/revgeocode";
const BROWSE_URL: &str = "https://browse.search.hereapi.com/v1/browse";
const LOOKUP_URL: &str = "https://lookup.search.hereapi.com/v1/lookup";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct HereProvider {
    client: reqwest::Client,
    cache: Arc<UnifiedCache>,
    rate_limiter: RateLimiter,
    rate_per_second: f64,
    api_key: Option<String>,
}

impl HereProvider {
    pub fn new(cache: Arc<UnifiedCache>, api_key: Option<String>, rate_limit_per_second: f64) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default(),
            cache,
            rate_limiter: RateLimiter::new(rate_limit_per_second),
            rate_per_second: rate_limit_per_second,
            api_key,
        }
    }

    fn require_api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or(ProviderError::NotConfigured("here_api_key"))
    }
}

/// HERE Places category ids searched for each category (SPEC_FULL §B.6).
fn here_category_for(category: PoiCategory) -> Option<&'static str> {
    match category {
        PoiCategory::GasStation => Some("700-7600-0116"),
        PoiCategory::Restaurant => Some("100-1000-0000"),
        PoiCategory::FastFood => Some("100-1000-0009"),
        PoiCategory::Cafe => Some("100-1100-0000"),
        PoiCategory::Hotel => Some("500-5000-0053"),
        PoiCategory::Hospital => Some("800-8060-0021"),
        PoiCategory::Pharmacy => Some("800-8200-0000"),
        PoiCategory::Bank => Some("700-7010-0000"),
        PoiCategory::Atm => Some("700-7011-0000"),
        PoiCategory::Supermarket => Some("600-6300-0066"),
        PoiCategory::Mechanic => Some("700-7600-0444"),
        PoiCategory::Services => Some("700-7900-0000"),
        PoiCategory::City | PoiCategory::Town | PoiCategory::Other => None,
    }
}

/// Reverse mapping: a HERE category id's first two dot-groups determine our
/// category (SPEC_FULL §B.6 — "reverse mapping by two-dot-group prefix").
fn category_from_here_id(here_category_id: &str) -> PoiCategory {
    let prefix: String = here_category_id.splitn(3, '-').take(2).collect::<Vec<_>>().join("-");
    match prefix.as_str() {
        "700-7600" => PoiCategory::GasStation,
        "100-1000" => PoiCategory::Restaurant,
        "100-1100" => PoiCategory::Cafe,
        "500-5000" => PoiCategory::Hotel,
        "800-8060" => PoiCategory::Hospital,
        "800-8200" => PoiCategory::Pharmacy,
        "700-7010" => PoiCategory::Bank,
        "700-7011" => PoiCategory::Atm,
        "600-6300" => PoiCategory::Supermarket,
        "700-7900" => PoiCategory::Services,
        _ => PoiCategory::Other,
    }
}

fn parse_here_item(item: &Value) -> Option<ProviderPoi> {
    let id = item.get("id").and_then(Value::as_str)?.to_string();
    let position = item.get("position")?;
    let lat = position.get("lat").and_then(Value::as_f64)?;
    let lon = position.get("lng").and_then(Value::as_f64)?;

    let name = item.get("title").and_then(Value::as_str).map(str::to_string);

    let categories = item.get("categories").and_then(Value::as_array).cloned().unwrap_or_default();
    let primary_category_id = categories
        .iter()
        .find(|c| c.get("primary").and_then(Value::as_bool).unwrap_or(false))
        .or_else(|| categories.first())
        .and_then(|c| c.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let category = category_from_here_id(primary_category_id);

    let address = item.get("address");
    let city = address.and_then(|a| a.get("city")).and_then(Value::as_str).map(str::to_string);

    let contacts = item.get("contacts").and_then(Value::as_array);
    let phone = contacts
        .and_then(|c| c.first())
        .and_then(|c| c.get("phone"))
        .and_then(Value::as_array)
        .and_then(|p| p.first())
        .and_then(|p| p.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let website = contacts
        .and_then(|c| c.first())
        .and_then(|c| c.get("www"))
        .and_then(Value::as_array)
        .and_then(|w| w.first())
        .and_then(|w| w.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut provider_data: HashMap<String, Value> = HashMap::new();
    provider_data.insert("here_id".into(), json!(id));
    provider_data.insert("here_category_id".into(), json!(primary_category_id));
    if let Some(raw_categories) = item.get("categories") {
        provider_data.insert("categories".into(), raw_categories.clone());
    }

    Some(ProviderPoi {
        id,
        name,
        category,
        location: Coordinate::new(lat, lon),
        city,
        operator: None,
        brand: None,
        opening_hours: None,
        phone,
        website,
        cuisine: None,
        amenities: Vec::new(),
        rating: None,
        review_count: None,
        provider_data,
    })
}

#[async_trait]
impl GeoProvider for HereProvider {
    async fn geocode(&self, address: &str) -> Result<Option<GeoLocation>, ProviderError> {
        let mut params = Map::new();
        params.insert("address".into(), json!(address));

        if let Some(cached) = self.cache.get::<GeoLocation>(ProviderKind::Here, "geocode", &params).await {
            return Ok(Some(cached));
        }

        let api_key = self.require_api_key()?;
        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(GEOCODE_URL)
            .query(&[("q", address), ("apiKey", api_key)])
            .send()
            .await
            .map_err(|e| ProviderError::Network { provider: "here", message: e.to_string() })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse { provider: "here", message: e.to_string() })?;

        let Some(item) = body.get("items").and_then(Value::as_array).and_then(|a| a.first()) else {
            return Ok(None);
        };

        let position = item.get("position");
        let latitude = position.and_then(|p| p.get("lat")).and_then(Value::as_f64).unwrap_or(0.0);
        let longitude = position.and_then(|p| p.get("lng")).and_then(Value::as_f64).unwrap_or(0.0);
        let address_obj = item.get("address");
        let city = address_obj.and_then(|a| a.get("city")).and_then(Value::as_str).map(str::to_string);
        let state = address_obj.and_then(|a| a.get("state")).and_then(Value::as_str).map(str::to_string);

        let location = GeoLocation {
            latitude,
            longitude,
            display_name: item.get("title").and_then(Value::as_str).map(str::to_string),
            city,
            state,
        };

        self.cache.set(ProviderKind::Here, "geocode", &params, &location).await;
        Ok(Some(location))
    }

    async fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
        poi_name: Option<&str>,
    ) -> Result<Option<GeoLocation>, ProviderError> {
        let mut params = Map::new();
        params.insert("latitude".into(), json!(lat));
        params.insert("longitude".into(), json!(lon));
        if let Some(name) = poi_name {
            params.insert("poi_name".into(), json!(name));
        }

        if let Some(cached) = self.cache.get::<GeoLocation>(ProviderKind::Here, "reverse_geocode", &params).await {
            return Ok(Some(cached));
        }

        let api_key = self.require_api_key()?;
        self.rate_limiter.acquire().await;

        let at = format!("{lat},{lon}");
        let response = self
            .client
            .get(REVGEOCODE_URL)
            .query(&[("at", at.as_str()), ("apiKey", api_key)])
            .send()
            .await
            .map_err(|e| ProviderError::Network { provider: "here", message: e.to_string() })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse { provider: "here", message: e.to_string() })?;

        let Some(item) = body.get("items").and_then(Value::as_array).and_then(|a| a.first()) else {
            return Ok(None);
        };

        let address_obj = item.get("address");
        let city = address_obj.and_then(|a| a.get("city")).and_then(Value::as_str).map(str::to_string);
        let state = address_obj.and_then(|a| a.get("state")).and_then(Value::as_str).map(str::to_string);

        let location = GeoLocation {
            latitude: lat,
            longitude: lon,
            display_name: item.get("title").and_then(Value::as_str).map(str::to_string),
            city,
            state,
        };

        self.cache.set(ProviderKind::Here, "reverse_geocode", &params, &location).await;
        Ok(Some(location))
    }

    async fn calculate_route(
        &self,
        _origin: &GeoLocation,
        _destination: &GeoLocation,
    ) -> Result<Option<Route>, ProviderError> {
        // Routing is always OSM/OSRM (spec §4.3) — HERE is never asked to route.
        Err(ProviderError::NotConfigured("here routing (unsupported, use osm)"))
    }

    async fn search_pois(
        &self,
        center_lat: f64,
        center_lon: f64,
        radius_m: f64,
        categories: &[PoiCategory],
        limit: u32,
    ) -> Result<Vec<ProviderPoi>, ProviderError> {
        let mut params = Map::new();
        params.insert("latitude".into(), json!(center_lat));
        params.insert("longitude".into(), json!(center_lon));
        params.insert("radius".into(), json!(radius_m));
        params.insert(
            "categories".into(),
            json!(categories.iter().map(|c| c.to_string()).collect::<Vec<_>>()),
        );

        if let Some(cached) = self.cache.get::<Vec<ProviderPoi>>(ProviderKind::Here, "poi_search", &params).await {
            return Ok(cached);
        }

        let api_key = self.require_api_key()?;
        let category_ids: Vec<&str> = categories.iter().filter_map(|&c| here_category_for(c)).collect();
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.rate_limiter.acquire().await;

        let at = format!("{center_lat},{center_lon}");
        let categories_param = category_ids.join(",");
        let limit_str = limit.to_string();
        let response = self
            .client
            .get(BROWSE_URL)
            .query(&[
                ("at", at.as_str()),
                ("categories", categories_param.as_str()),
                ("limit", limit_str.as_str()),
                ("apiKey", api_key),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Network { provider: "here", message: e.to_string() })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse { provider: "here", message: e.to_string() })?;

        let pois: Vec<ProviderPoi> = body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_here_item).collect())
            .unwrap_or_default();

        self.cache.set(ProviderKind::Here, "poi_search", &params, &pois).await;
        Ok(pois)
    }

    async fn get_poi_details(&self, id: &str) -> Result<Option<ProviderPoi>, ProviderError> {
        let mut params = Map::new();
        params.insert("id".into(), json!(id));

        if let Some(cached) = self.cache.get::<ProviderPoi>(ProviderKind::Here, "poi_details", &params).await {
            return Ok(Some(cached));
        }

        let api_key = self.require_api_key()?;
        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(LOOKUP_URL)
            .query(&[("id", id), ("apiKey", api_key)])
            .send()
            .await
            .map_err(|e| ProviderError::Network { provider: "here", message: e.to_string() })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let item: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse { provider: "here", message: e.to_string() })?;

        let poi = parse_here_item(&item);
        if let Some(ref p) = poi {
            self.cache.set(ProviderKind::Here, "poi_details", &params, p).await;
        }
        Ok(poi)
    }

    fn provider_type(&self) -> ProviderKind {
        ProviderKind::Here
    }

    fn supports_offline_export(&self) -> bool {
        false
    }

    fn rate_limit_per_second(&self) -> f64 {
        self.rate_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_here_id_prefix() {
        let id = here_category_for(PoiCategory::GasStation).unwrap();
        assert_eq!(category_from_here_id(id), PoiCategory::GasStation);

        let id = here_category_for(PoiCategory::Hotel).unwrap();
        assert_eq!(category_from_here_id(id), PoiCategory::Hotel);
    }

    #[test]
    fn unknown_category_prefix_maps_to_other() {
        assert_eq!(category_from_here_id("999-9999-0000"), PoiCategory::Other);
    }

    #[test]
    fn place_categories_have_no_here_equivalent() {
        assert!(here_category_for(PoiCategory::City).is_none());
        assert!(here_category_for(PoiCategory::Town).is_none());
    }
}
