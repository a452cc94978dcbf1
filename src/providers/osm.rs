//! OSM-backed provider adapter: Nominatim geocoding, OSRM routing, Overpass
//! POI search (spec §4.3).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::cache::UnifiedCache;
use crate::error::ProviderError;
use crate::geo_utils::haversine;
use crate::models::{Coordinate, GeoLocation, PoiCategory, ProviderKind, ProviderPoi, Route, RouteStep};
use crate::providers::rate_limit::RateLimiter;
use crate::providers::GeoProvider;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const OSRM_URL: &str = "http://router.project-osrm.org/route/v1/driving";
const OVERPASS_ENDPOINTS: &[&str] = &[
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.openstreetmap.fr/api/interpreter",
];
const OVERPASS_MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OsmProvider {
    client: reqwest::Client,
    cache: Arc<UnifiedCache>,
    rate_limiter: RateLimiter,
    rate_per_second: f64,
    overpass_endpoint_idx: AtomicUsize,
}

impl OsmProvider {
    pub fn new(cache: Arc<UnifiedCache>, rate_limit_per_second: f64) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default(),
            cache,
            rate_limiter: RateLimiter::new(rate_limit_per_second),
            rate_per_second: rate_limit_per_second,
            overpass_endpoint_idx: AtomicUsize::new(0),
        }
    }

    fn next_overpass_endpoint(&self) -> &'static str {
        let idx = self.overpass_endpoint_idx.fetch_add(1, Ordering::Relaxed);
        OVERPASS_ENDPOINTS[idx % OVERPASS_ENDPOINTS.len()]
    }

    fn address_from_value(address: &Value) -> (Option<String>, Option<String>) {
        let city = ["city", "town", "village", "municipality", "county"]
            .iter()
            .find_map(|field| address.get(field).and_then(Value::as_str))
            .map(str::to_string);
        let state = address.get("state").and_then(Value::as_str).map(str::to_string);
        (city, state)
    }
}

#[async_trait]
impl GeoProvider for OsmProvider {
    async fn geocode(&self, address: &str) -> Result<Option<GeoLocation>, ProviderError> {
        let mut params = Map::new();
        params.insert("address".into(), json!(address));

        if let Some(cached) = self.cache.get::<GeoLocation>(ProviderKind::Osm, "geocode", &params).await {
            return Ok(Some(cached));
        }

        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(format!("{NOMINATIM_URL}/search"))
            .query(&[
                ("q", address),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .header("User-Agent", "mapalinear/0.1")
            .send()
            .await
            .map_err(|e| ProviderError::Network { provider: "nominatim", message: e.to_string() })?;

        let body: Vec<Value> = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse { provider: "nominatim", message: e.to_string() })?;

        let Some(first) = body.into_iter().next() else {
            return Ok(None);
        };

        let lat = first.get("lat").and_then(Value::as_str).and_then(|s| s.parse().ok());
        let lon = first.get("lon").and_then(Value::as_str).and_then(|s| s.parse().ok());
        let (Some(latitude), Some(longitude)) = (lat, lon) else {
            return Ok(None);
        };

        let address_obj = first.get("address").cloned().unwrap_or(Value::Null);
        let (city, state) = Self::address_from_value(&address_obj);

        let location = GeoLocation {
            latitude,
            longitude,
            display_name: first.get("display_name").and_then(Value::as_str).map(str::to_string),
            city,
            state,
        };

        self.cache.set(ProviderKind::Osm, "geocode", &params, &location).await;
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
            // poi_name participates in the cache key only (spec §4.3).
            params.insert("poi_name".into(), json!(name));
        }

        if let Some(cached) = self.cache.get::<GeoLocation>(ProviderKind::Osm, "reverse_geocode", &params).await {
            return Ok(Some(cached));
        }

        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(format!("{NOMINATIM_URL}/reverse"))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "jsonv2".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .header("User-Agent", "mapalinear/0.1")
            .send()
            .await
            .map_err(|e| ProviderError::Network { provider: "nominatim", message: e.to_string() })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse { provider: "nominatim", message: e.to_string() })?;

        if body.get("error").is_some() {
            return Ok(None);
        }

        let address_obj = body.get("address").cloned().unwrap_or(Value::Null);
        let (city, state) = Self::address_from_value(&address_obj);

        let location = GeoLocation {
            latitude: lat,
            longitude: lon,
            display_name: body.get("display_name").and_then(Value::as_str).map(str::to_string),
            city,
            state,
        };

        self.cache.set(ProviderKind::Osm, "reverse_geocode", &params, &location).await;
        Ok(Some(location))
    }

    async fn calculate_route(
        &self,
        origin: &GeoLocation,
        destination: &GeoLocation,
    ) -> Result<Option<Route>, ProviderError> {
        let mut params = Map::new();
        params.insert("origin_lat".into(), json!(origin.latitude));
        params.insert("origin_lon".into(), json!(origin.longitude));
        params.insert("dest_lat".into(), json!(destination.latitude));
        params.insert("dest_lon".into(), json!(destination.longitude));

        if let Some(cached) = self.cache.get::<Route>(ProviderKind::Osm, "route", &params).await {
            return Ok(Some(cached));
        }

        self.rate_limiter.acquire().await;

        let url = format!(
            "{OSRM_URL}/{},{};{},{}",
            origin.longitude, origin.latitude, destination.longitude, destination.latitude
        );

        let response = self
            .client
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "geojson"), ("steps", "true")])
            .send()
            .await
            .map_err(|e| ProviderError::Network { provider: "osrm", message: e.to_string() })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse { provider: "osrm", message: e.to_string() })?;

        let Some(route_json) = body.get("routes").and_then(Value::as_array).and_then(|r| r.first()) else {
            return Ok(None);
        };

        let route = parse_osrm_route(route_json)?;
        self.cache.set(ProviderKind::Osm, "route", &params, &route).await;
        Ok(Some(route))
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

        if let Some(cached) = self.cache.get::<Vec<ProviderPoi>>(ProviderKind::Osm, "poi_search", &params).await {
            return Ok(cached);
        }

        let query = build_overpass_query(center_lat, center_lon, radius_m, categories);
        let elements = self.execute_overpass_with_retry(query).await?;

        let mut pois: Vec<ProviderPoi> = elements
            .iter()
            .filter_map(parse_osm_element_to_poi)
            .collect();
        pois.truncate(limit as usize);

        self.cache.set(ProviderKind::Osm, "poi_search", &params, &pois).await;
        Ok(pois)
    }

    async fn get_poi_details(&self, id: &str) -> Result<Option<ProviderPoi>, ProviderError> {
        let mut params = Map::new();
        params.insert("id".into(), json!(id));

        if let Some(cached) = self.cache.get::<ProviderPoi>(ProviderKind::Osm, "poi_details", &params).await {
            return Ok(Some(cached));
        }

        // Overpass supports direct element lookup by type/id; kept minimal
        // since full detail enrichment is HERE's job (spec §4.3/§4.10).
        let Some((kind, numeric_id)) = id.split_once('/') else {
            return Ok(None);
        };
        let query = format!("[out:json][timeout:25];{kind}({numeric_id});out tags center;");
        let elements = self.execute_overpass_with_retry(query).await?;
        let poi = elements.first().and_then(parse_osm_element_to_poi);

        if let Some(ref p) = poi {
            self.cache.set(ProviderKind::Osm, "poi_details", &params, p).await;
        }
        Ok(poi)
    }

    fn provider_type(&self) -> ProviderKind {
        ProviderKind::Osm
    }

    fn supports_offline_export(&self) -> bool {
        false
    }

    fn rate_limit_per_second(&self) -> f64 {
        self.rate_per_second
    }
}

impl OsmProvider {
    async fn execute_overpass_with_retry(&self, query: String) -> Result<Vec<Value>, ProviderError> {
        let mut attempt = 0;
        loop {
            self.rate_limiter.acquire().await;
            let endpoint = self.next_overpass_endpoint();

            let result = self
                .client
                .post(endpoint)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(format!("data={}", urlencode(&query)))
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    let body: Value = response
                        .json()
                        .await
                        .map_err(|e| ProviderError::Parse { provider: "overpass", message: e.to_string() })?;
                    let elements = body
                        .get("elements")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    return Ok(elements);
                }
                Ok(response) => {
                    warn!(status = %response.status(), endpoint, "overpass endpoint returned error");
                }
                Err(e) => {
                    warn!(error = %e, endpoint, "overpass request failed");
                }
            }

            attempt += 1;
            if attempt >= OVERPASS_MAX_ATTEMPTS {
                return Err(ProviderError::EndpointsExhausted { provider: "overpass", attempts: attempt });
            }
            let backoff_ms = 500u64 * 2u64.pow(attempt);
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn parse_osrm_route(route_json: &Value) -> Result<Route, ProviderError> {
    let total_distance_km = route_json.get("distance").and_then(Value::as_f64).unwrap_or(0.0) / 1000.0;
    let total_duration_min = route_json.get("duration").and_then(Value::as_f64).unwrap_or(0.0) / 60.0;

    let geometry = route_json
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
        .map(|coords| {
            coords
                .iter()
                .filter_map(|pair| {
                    let arr = pair.as_array()?;
                    let lon = arr.first()?.as_f64()?;
                    let lat = arr.get(1)?.as_f64()?;
                    Some((lat, lon))
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut steps = Vec::new();
    let mut road_names = Vec::new();
    if let Some(legs) = route_json.get("legs").and_then(Value::as_array) {
        for leg in legs {
            if let Some(leg_steps) = leg.get("steps").and_then(Value::as_array) {
                for step_json in leg_steps {
                    let step_geometry = step_json
                        .get("geometry")
                        .and_then(|g| g.get("coordinates"))
                        .and_then(Value::as_array)
                        .map(|coords| {
                            coords
                                .iter()
                                .filter_map(|pair| {
                                    let arr = pair.as_array()?;
                                    let lon = arr.first()?.as_f64()?;
                                    let lat = arr.get(1)?.as_f64()?;
                                    Some((lat, lon))
                                })
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default();

                    let start = *step_geometry.first().unwrap_or(&(0.0, 0.0));
                    let end = *step_geometry.last().unwrap_or(&(0.0, 0.0));
                    let road_name = step_json.get("name").and_then(Value::as_str).map(str::to_string);
                    if let Some(ref name) = road_name {
                        if !name.is_empty() {
                            road_names.push(name.clone());
                        }
                    }

                    steps.push(RouteStep {
                        start_coords: start,
                        end_coords: end,
                        distance_km: step_json.get("distance").and_then(Value::as_f64).unwrap_or(0.0) / 1000.0,
                        duration_s: step_json.get("duration").and_then(Value::as_f64).unwrap_or(0.0),
                        geometry: step_geometry,
                        road_name,
                        maneuver_type: step_json
                            .get("maneuver")
                            .and_then(|m| m.get("type"))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    });
                }
            }
        }
    }

    Ok(Route { total_distance_km, total_duration_min, geometry, steps, road_names })
}

/// OSM amenity tags searched for each category (restored from the
/// original's `_get_osm_amenities_for_category`, SPEC_FULL §B).
fn amenity_tags_for(category: PoiCategory) -> &'static [&'static str] {
    match category {
        PoiCategory::GasStation => &["fuel"],
        PoiCategory::Restaurant => &["restaurant"],
        PoiCategory::FastFood => &["fast_food"],
        PoiCategory::Cafe => &["cafe"],
        PoiCategory::Hospital => &["hospital"],
        PoiCategory::Pharmacy => &["pharmacy"],
        PoiCategory::Bank => &["bank"],
        PoiCategory::Atm => &["atm"],
        PoiCategory::Services => &["police"],
        _ => &[],
    }
}

fn tourism_tags_for(category: PoiCategory) -> &'static [&'static str] {
    match category {
        PoiCategory::Hotel => &["hotel", "motel"],
        _ => &[],
    }
}

fn shop_tags_for(category: PoiCategory) -> &'static [&'static str] {
    match category {
        PoiCategory::Supermarket => &["supermarket"],
        PoiCategory::Mechanic => &["car_repair"],
        _ => &[],
    }
}

/// Builds the Overpass QL query, using a 5x larger bbox for place
/// (city/town/village) searches than for regular amenities (spec §4.3).
fn build_overpass_query(center_lat: f64, center_lon: f64, radius_m: f64, categories: &[PoiCategory]) -> String {
    let degree_radius = radius_m / 111_000.0;
    let bbox = format!(
        "{},{},{},{}",
        center_lat - degree_radius,
        center_lon - degree_radius,
        center_lat + degree_radius,
        center_lon + degree_radius
    );
    let places_radius = degree_radius * 5.0;
    let bbox_places = format!(
        "{},{},{},{}",
        center_lat - places_radius,
        center_lon - places_radius,
        center_lat + places_radius,
        center_lon + places_radius
    );

    let mut parts = vec!["[out:json][timeout:25];(".to_string()];
    let mut include_places = false;

    for &category in categories {
        for tag in amenity_tags_for(category) {
            parts.push(format!("  node[\"amenity\"=\"{tag}\"]({bbox});"));
            parts.push(format!("  way[\"amenity\"=\"{tag}\"]({bbox});"));
        }
        for tag in tourism_tags_for(category) {
            parts.push(format!("  node[\"tourism\"=\"{tag}\"]({bbox});"));
            parts.push(format!("  way[\"tourism\"=\"{tag}\"]({bbox});"));
        }
        for tag in shop_tags_for(category) {
            parts.push(format!("  node[\"shop\"=\"{tag}\"]({bbox});"));
            parts.push(format!("  way[\"shop\"=\"{tag}\"]({bbox});"));
        }
        if matches!(category, PoiCategory::City | PoiCategory::Town | PoiCategory::Services) {
            include_places = true;
        }
    }

    if include_places {
        for place_type in ["city", "town", "village"] {
            parts.push(format!("  node[\"place\"=\"{place_type}\"]({bbox_places});"));
            parts.push(format!("  way[\"place\"=\"{place_type}\"]({bbox_places});"));
        }
    }

    parts.push(");out center tags;".to_string());
    parts.join("\n")
}

const ABANDONMENT_INDICATORS: &[&str] =
    &["abandoned", "disused", "demolished", "razed", "removed", "ruins", "former", "closed", "destroyed"];

fn is_poi_abandoned(tags: &HashMap<String, String>) -> bool {
    for indicator in ABANDONMENT_INDICATORS {
        if matches!(tags.get(*indicator).map(String::as_str), Some("yes" | "true" | "1")) {
            return true;
        }
        if tags.keys().any(|k| k.starts_with(&format!("{indicator}:"))) {
            return true;
        }
    }
    matches!(tags.get("opening_hours").map(String::as_str), Some("closed" | "no"))
}

/// Quality score over 7 completeness criteria, scaled to `[0, 1]`
/// (restored verbatim from `_calculate_poi_quality_score`, SPEC_FULL §B.2).
fn calculate_quality_score(tags: &HashMap<String, String>) -> f64 {
    let mut score = 0.0;
    if tags.contains_key("name") {
        score += 1.0;
    }
    if tags.contains_key("operator") || tags.contains_key("brand") {
        score += 1.0;
    }
    if tags.contains_key("phone") || tags.contains_key("contact:phone") {
        score += 1.0;
    }
    if tags.contains_key("opening_hours") {
        score += 1.0;
    }
    if tags.contains_key("website") || tags.contains_key("contact:website") {
        score += 1.0;
    }
    let is_restaurant = tags.get("amenity").map(String::as_str) == Some("restaurant");
    if is_restaurant {
        if tags.contains_key("cuisine") {
            score += 1.0;
        }
    } else {
        score += 1.0;
    }
    if ["street", "housenumber", "city"].iter().any(|f| tags.contains_key(&format!("addr:{f}"))) {
        score += 1.0;
    }
    score / 7.0
}

/// Per-category minimum-quality gate (restored from `_meets_quality_threshold`).
fn meets_quality_threshold(tags: &HashMap<String, String>, quality_score: f64) -> bool {
    let amenity = tags.get("amenity").map(String::as_str);
    let barrier = tags.get("barrier").map(String::as_str);

    if amenity == Some("fuel") {
        if !(tags.contains_key("name") || tags.contains_key("brand") || tags.contains_key("operator")) {
            return false;
        }
        return quality_score >= 0.3;
    }

    let food_amenities = ["restaurant", "fast_food", "cafe", "bar", "pub", "food_court", "ice_cream"];
    let is_food_shop = tags.get("shop").map(String::as_str) == Some("bakery");
    if amenity.map(|a| food_amenities.contains(&a)).unwrap_or(false) || is_food_shop {
        if !tags.contains_key("name") {
            return false;
        }
        return quality_score >= 0.4;
    }

    if barrier == Some("toll_booth") {
        return true;
    }

    quality_score >= 0.3
}

fn identify_quality_issues(tags: &HashMap<String, String>, quality_score: f64) -> Vec<String> {
    let mut issues = Vec::new();
    if is_poi_abandoned(tags) {
        issues.push("abandoned".to_string());
    }
    if !tags.contains_key("name") {
        issues.push("missing_name".to_string());
    }
    if tags.get("amenity").map(String::as_str) == Some("fuel")
        && !(tags.contains_key("brand") || tags.contains_key("operator"))
    {
        issues.push("missing_brand".to_string());
    }
    if quality_score < 0.3 {
        issues.push("low_score".to_string());
    }
    if !(tags.contains_key("phone")
        || tags.contains_key("contact:phone")
        || tags.contains_key("website")
        || tags.contains_key("contact:website"))
    {
        issues.push("missing_contact".to_string());
    }
    if !tags.contains_key("opening_hours") {
        issues.push("missing_hours".to_string());
    }
    issues
}

fn category_from_tags(tags: &HashMap<String, String>) -> PoiCategory {
    if let Some(amenity) = tags.get("amenity") {
        return match amenity.as_str() {
            "fuel" => PoiCategory::GasStation,
            "restaurant" => PoiCategory::Restaurant,
            "fast_food" => PoiCategory::FastFood,
            "cafe" => PoiCategory::Cafe,
            "hospital" => PoiCategory::Hospital,
            "pharmacy" => PoiCategory::Pharmacy,
            "bank" => PoiCategory::Bank,
            "atm" => PoiCategory::Atm,
            "police" => PoiCategory::Services,
            _ => PoiCategory::Other,
        };
    }
    if let Some(tourism) = tags.get("tourism") {
        if matches!(tourism.as_str(), "hotel" | "motel") {
            return PoiCategory::Hotel;
        }
    }
    if let Some(shop) = tags.get("shop") {
        return match shop.as_str() {
            "supermarket" => PoiCategory::Supermarket,
            "car_repair" => PoiCategory::Mechanic,
            _ => PoiCategory::Other,
        };
    }
    if let Some(place) = tags.get("place") {
        return match place.as_str() {
            "city" => PoiCategory::City,
            "town" | "village" => PoiCategory::Town,
            _ => PoiCategory::Other,
        };
    }
    PoiCategory::Other
}

fn parse_osm_element_to_poi(element: &Value) -> Option<ProviderPoi> {
    let element_type = element.get("type").and_then(Value::as_str)?;
    let id = element.get("id").and_then(Value::as_u64)?;

    let (lat, lon) = if element_type == "node" {
        (element.get("lat").and_then(Value::as_f64)?, element.get("lon").and_then(Value::as_f64)?)
    } else {
        let center = element.get("center")?;
        (center.get("lat").and_then(Value::as_f64)?, center.get("lon").and_then(Value::as_f64)?)
    };

    let tags_value = element.get("tags").cloned().unwrap_or(Value::Object(Map::new()));
    let tags: HashMap<String, String> = tags_value
        .as_object()?
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect();

    let quality_score = calculate_quality_score(&tags);
    if !meets_quality_threshold(&tags, quality_score) {
        return None;
    }

    let category = category_from_tags(&tags);
    let amenities: Vec<String> = ["amenity", "tourism", "shop", "place"]
        .iter()
        .filter_map(|k| tags.get(*k).cloned())
        .collect();

    let mut provider_data: HashMap<String, Value> = HashMap::new();
    for (k, v) in &tags {
        provider_data.insert(k.clone(), json!(v));
    }
    provider_data.insert("quality_score".into(), json!(quality_score));
    provider_data.insert("quality_issues".into(), json!(identify_quality_issues(&tags, quality_score)));
    provider_data.insert("is_low_quality".into(), json!(quality_score < 0.3));
    provider_data.insert("is_abandoned".into(), json!(is_poi_abandoned(&tags)));

    let city = ["addr:city"].iter().find_map(|k| tags.get(*k).cloned());

    Some(ProviderPoi {
        id: format!("{element_type}/{id}"),
        name: tags.get("name").cloned(),
        category,
        location: Coordinate::new(lat, lon),
        city,
        operator: tags.get("operator").cloned(),
        brand: tags.get("brand").cloned(),
        opening_hours: tags.get("opening_hours").cloned(),
        phone: tags.get("phone").cloned().or_else(|| tags.get("contact:phone").cloned()),
        website: tags.get("website").cloned().or_else(|| tags.get("contact:website").cloned()),
        cuisine: tags.get("cuisine").cloned(),
        amenities,
        rating: None,
        review_count: None,
        provider_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn quality_score_rewards_completeness() {
        let full = tags(&[
            ("name", "Posto Ipiranga"),
            ("brand", "Ipiranga"),
            ("phone", "+55 11 1234"),
            ("opening_hours", "24/7"),
            ("website", "https://example.com"),
            ("amenity", "fuel"),
            ("addr:city", "Sao Paulo"),
        ]);
        assert!((calculate_quality_score(&full) - 1.0).abs() < 1e-9);

        let empty: HashMap<String, String> = HashMap::new();
        assert!((calculate_quality_score(&empty) - (1.0 / 7.0)).abs() < 1e-9); // non-restaurant bonus
    }

    #[test]
    fn fuel_requires_name_brand_or_operator() {
        let no_identity = tags(&[("amenity", "fuel")]);
        assert!(!meets_quality_threshold(&no_identity, 0.5));

        let branded = tags(&[("amenity", "fuel"), ("brand", "Shell")]);
        let score = calculate_quality_score(&branded);
        assert!(meets_quality_threshold(&branded, score));
    }

    #[test]
    fn food_amenity_requires_name() {
        let unnamed = tags(&[("amenity", "restaurant")]);
        assert!(!meets_quality_threshold(&unnamed, 0.9));
    }

    #[test]
    fn toll_booth_always_included() {
        let toll: HashMap<String, String> = tags(&[("barrier", "toll_booth")]);
        assert!(meets_quality_threshold(&toll, 0.0));
    }

    #[test]
    fn abandoned_detection_checks_indicator_values_and_prefixes() {
        assert!(is_poi_abandoned(&tags(&[("abandoned", "yes")])));
        assert!(is_poi_abandoned(&tags(&[("abandoned:amenity", "fuel")])));
        assert!(is_poi_abandoned(&tags(&[("opening_hours", "closed")])));
        assert!(!is_poi_abandoned(&tags(&[("amenity", "fuel")])));
    }

    #[test]
    fn overpass_query_uses_five_times_bbox_for_places() {
        let query = build_overpass_query(0.0, 0.0, 1000.0, &[PoiCategory::City]);
        assert!(query.contains("place"));
        // 5x radius means roughly 5x the degree span in the place bbox line.
        assert!(query.contains("0.045"));
    }

    #[test]
    fn distance_between_discovery_point_and_poi_is_haversine() {
        let d = haversine(0.0, 0.0, 0.0, 0.01);
        assert!(d > 1000.0 && d < 1200.0);
    }
}
