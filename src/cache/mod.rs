//! Provider/operation-scoped cache with address-similarity and spatial
//! fallback lookup (spec §4.2).

pub mod key;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::config::CacheTtls;
use crate::geo_utils::haversine;
use crate::models::{CacheStats, ProviderKind};

use key::{addresses_similar, generate_key, normalize_address, normalize_params};

fn ttl_for(ttls: &CacheTtls, operation: &str) -> Duration {
    match operation {
        "geocode" | "reverse_geocode" => ttls.geocode,
        "route" => ttls.route,
        "poi_search" => ttls.poi_search,
        "poi_details" => ttls.poi_details,
        "google_places" => ttls.google_places,
        _ => Duration::from_secs(3600),
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
}

/// The unified, provider-agnostic cache (spec §4.2 contract).
///
/// Cache errors are never fatal: reads that fail are logged and treated as
/// a miss; writes that fail are logged and skipped. The calling operation
/// always proceeds against the upstream provider.
pub struct UnifiedCache {
    pool: PgPool,
    ttls: CacheTtls,
    counters: Counters,
}

impl UnifiedCache {
    pub fn new(pool: PgPool, ttls: CacheTtls) -> Self {
        Self { pool, ttls, counters: Counters::default() }
    }

    /// Looks up `(provider, operation, params)`, falling back to semantic
    /// (geocode) or spatial (poi_search) matching on exact-key miss.
    pub async fn get<T: serde::de::DeserializeOwned>(
        &self,
        provider: ProviderKind,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Option<T> {
        let normalized = normalize_params(params);
        let primary_key = generate_key(provider, operation, &normalized);

        match crate::db::cache_repo::fetch_exact(&self.pool, &primary_key).await {
            Ok(Some(row)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                let _ = crate::db::cache_repo::record_hit(&self.pool, &primary_key).await;
                debug!(operation, "cache hit (exact)");
                return serde_json::from_value(row.data).ok();
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "cache read failed, treating as miss");
                return None;
            }
        }

        if operation == "geocode" {
            if let Some(Value::String(address)) = params.get("address") {
                if let Some(data) = self.find_similar_geocode(address).await {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("cache hit (semantic address match)");
                    return serde_json::from_value(data).ok();
                }
            }
        } else if operation == "poi_search" {
            if let (Some(lat), Some(lon), Some(radius)) = (
                params.get("latitude").and_then(Value::as_f64),
                params.get("longitude").and_then(Value::as_f64),
                params.get("radius").and_then(Value::as_f64),
            ) {
                let categories = params
                    .get("categories")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                if let Some(data) = self.find_spatial_poi_match(lat, lon, radius, &categories).await {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("cache hit (spatial match)");
                    return serde_json::from_value(data).ok();
                }
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn find_similar_geocode(&self, address: &str) -> Option<Value> {
        let normalized_target = normalize_address(address);
        let rows = crate::db::cache_repo::fetch_live_rows_for_operation(&self.pool, "geocode")
            .await
            .ok()?;

        for row in rows {
            let cached_address = row.params.get("address").and_then(Value::as_str).unwrap_or("");
            let normalized_cached = normalize_address(cached_address);
            if addresses_similar(&normalized_target, &normalized_cached) {
                return Some(row.data);
            }
        }
        None
    }

    async fn find_spatial_poi_match(
        &self,
        target_lat: f64,
        target_lon: f64,
        target_radius: f64,
        target_categories: &[Value],
    ) -> Option<Value> {
        let rows = crate::db::cache_repo::fetch_live_rows_for_operation(&self.pool, "poi_search")
            .await
            .ok()?;

        let target_set: std::collections::BTreeSet<String> =
            target_categories.iter().map(|v| v.to_string()).collect();

        for row in rows {
            let cached_lat = row.params.get("latitude").and_then(Value::as_f64);
            let cached_lon = row.params.get("longitude").and_then(Value::as_f64);
            let cached_radius = row.params.get("radius").and_then(Value::as_f64);
            let (cached_lat, cached_lon, cached_radius) = match (cached_lat, cached_lon, cached_radius) {
                (Some(a), Some(b), Some(c)) => (a, b, c),
                _ => continue,
            };

            let cached_set: std::collections::BTreeSet<String> = row
                .params
                .get("categories")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().map(|v| v.to_string()).collect())
                .unwrap_or_default();

            let distance_m = haversine(target_lat, target_lon, cached_lat, cached_lon);
            if distance_m < (target_radius + cached_radius) / 2.0 && target_set == cached_set {
                return Some(row.data);
            }
        }
        None
    }

    /// Upserts `data` under `(provider, operation, params)` with the TTL
    /// configured for `operation`. Never fails the caller — cache write
    /// errors are logged and swallowed.
    pub async fn set<T: Serialize>(
        &self,
        provider: ProviderKind,
        operation: &str,
        params: &Map<String, Value>,
        data: &T,
    ) {
        let normalized = normalize_params(params);
        let key = generate_key(provider, operation, &normalized);
        let ttl = ttl_for(&self.ttls, operation);
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();

        let serialized = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to serialize cache payload, skipping write");
                return;
            }
        };
        let params_value = Value::Object(normalized);

        match crate::db::cache_repo::upsert(
            &self.pool,
            &key,
            &serialized,
            &provider.to_string(),
            operation,
            expires_at,
            &params_value,
        )
        .await
        {
            Ok(()) => {
                let sets = self.counters.sets.fetch_add(1, Ordering::Relaxed) + 1;
                if sets % 100 == 0 {
                    self.cleanup_expired().await;
                }
            }
            Err(e) => warn!(error = %e, "cache write failed, continuing without caching"),
        }
    }

    /// Deletes rows matching a `provider:operation:*` style glob.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        crate::db::cache_repo::delete_by_pattern(&self.pool, pattern).await.unwrap_or(0)
    }

    pub async fn clear(&self) {
        if let Err(e) = crate::db::cache_repo::clear(&self.pool).await {
            warn!(error = %e, "failed to clear cache");
        }
    }

    pub async fn cleanup_expired(&self) -> u64 {
        match crate::db::cache_repo::delete_expired(&self.pool).await {
            Ok(n) => {
                if n > 0 {
                    self.counters.evictions.fetch_add(n, Ordering::Relaxed);
                    debug!(deleted = n, "swept expired cache entries");
                }
                n
            }
            Err(e) => {
                warn!(error = %e, "cache cleanup failed");
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let total_entries = crate::db::cache_repo::count_live(&self.pool).await.unwrap_or(0);
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate_percent = if total > 0 { hits as f64 / total as f64 * 100.0 } else { 0.0 };

        CacheStats {
            backend: "postgres",
            total_entries,
            hits,
            misses,
            sets: self.counters.sets.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            hit_rate_percent: (hit_rate_percent * 100.0).round() / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::key::*;

    #[test]
    fn ttl_lookup_matches_spec_defaults() {
        use super::ttl_for;
        use crate::config::CacheTtls;
        let ttls = CacheTtls::default();
        assert_eq!(ttl_for(&ttls, "geocode").as_secs(), 604_800);
        assert_eq!(ttl_for(&ttls, "reverse_geocode").as_secs(), 604_800);
        assert_eq!(ttl_for(&ttls, "route").as_secs(), 21_600);
        assert_eq!(ttl_for(&ttls, "poi_search").as_secs(), 86_400);
        assert_eq!(ttl_for(&ttls, "poi_details").as_secs(), 43_200);
        assert_eq!(ttl_for(&ttls, "unknown_op").as_secs(), 3600);
    }

    #[test]
    fn normalize_address_applies_abbreviations() {
        assert_eq!(normalize_address("Avenida Paulista"), "av paulista");
    }
}
