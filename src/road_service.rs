//! Top-level pipeline conductor: geocode, route, segment, search, persist,
//! enrich, assemble (spec §4.10).

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::async_ops;
use crate::cache::UnifiedCache;
use crate::error::{PersistenceError, PipelineError};
use crate::map_assembly::{self, DebugCollector};
use crate::models::{AsyncOperation, Map, PoiCategory};
use crate::poi_persistence;
use crate::poi_search::{search_pois_for_segment, SearchAttemptTally};
use crate::providers::ProviderRegistry;
use crate::segment_engine;

/// Search categories used when the caller doesn't narrow them, mirroring the
/// original's `include_gas_stations`/`include_food`/... toggles collapsed
/// into one default set (SPEC_FULL §B).
pub const DEFAULT_CATEGORIES: &[PoiCategory] = &[
    PoiCategory::GasStation,
    PoiCategory::Restaurant,
    PoiCategory::FastFood,
    PoiCategory::Cafe,
    PoiCategory::Hotel,
    PoiCategory::Hospital,
    PoiCategory::Pharmacy,
    PoiCategory::Bank,
    PoiCategory::Atm,
    PoiCategory::Supermarket,
    PoiCategory::Mechanic,
    PoiCategory::Services,
];

/// Matches the original's `max_distance_from_road` default (road_service.py).
pub const DEFAULT_MAX_DISTANCE_M: f64 = 3000.0;
const DEFAULT_LOOKBACK_KM: f64 = 10.0;

pub struct GenerateMapOptions<'a> {
    pub categories: &'a [PoiCategory],
    pub max_distance_m: f64,
    pub road_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub version_suffix: Option<&'a str>,
}

impl Default for GenerateMapOptions<'_> {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES,
            max_distance_m: DEFAULT_MAX_DISTANCE_M,
            road_id: None,
            user_id: None,
            version_suffix: None,
        }
    }
}

pub struct RoadService {
    pool: PgPool,
    cache: std::sync::Arc<UnifiedCache>,
    providers: ProviderRegistry,
}

fn extract_origin_city(origin: &str) -> String {
    origin.split(',').next().unwrap_or(origin).trim().to_string()
}

impl RoadService {
    pub fn new(pool: PgPool, cache: std::sync::Arc<UnifiedCache>, providers: ProviderRegistry) -> Self {
        Self { pool, cache, providers }
    }

    /// Creates the [`AsyncOperation`] that will track a map generation,
    /// without running the pipeline. Lets a caller (e.g. the dev API) hand
    /// back an `operation_id` immediately and run [`Self::run`] in the
    /// background.
    pub async fn start_operation(&self, user_id: Option<Uuid>) -> Result<AsyncOperation, PersistenceError> {
        async_ops::create(&self.pool, "generate_map", user_id, None).await
    }

    /// Runs the full pipeline against an already-created operation, reporting
    /// progress via `progress_cb` as it proceeds (spec §4.10 step 8), and
    /// finalizing the operation to `completed`/`failed` on exit.
    pub async fn run(
        &self,
        operation_id: Uuid,
        origin: &str,
        destination: &str,
        options: GenerateMapOptions<'_>,
        mut progress_cb: impl FnMut(f64),
    ) -> Result<Map, PipelineError> {
        match self.run_pipeline(origin, destination, options, operation_id, &mut progress_cb).await {
            Ok(map) => {
                let result = serde_json::json!({ "map_id": map.id });
                async_ops::complete(&self.pool, operation_id, result).await?;
                Ok(map)
            }
            Err(e) => {
                async_ops::fail(&self.pool, operation_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    /// Creates the operation and runs the pipeline to completion, returning
    /// both the [`Map`] and the finalized [`AsyncOperation`]. For callers
    /// that want to await the whole thing synchronously (tests, CLI use).
    pub async fn generate_linear_map(
        &self,
        origin: &str,
        destination: &str,
        options: GenerateMapOptions<'_>,
        progress_cb: impl FnMut(f64),
    ) -> Result<(Map, AsyncOperation), PipelineError> {
        let operation = self.start_operation(options.user_id).await?;
        let map = self.run(operation.id, origin, destination, options, progress_cb).await?;
        let completed = async_ops::get(&self.pool, operation.id).await?;
        Ok((map, completed))
    }

    async fn run_pipeline(
        &self,
        origin: &str,
        destination: &str,
        options: GenerateMapOptions<'_>,
        operation_id: Uuid,
        progress_cb: &mut impl FnMut(f64),
    ) -> Result<Map, PipelineError> {
        let origin_city = extract_origin_city(origin);

        // Step 1-2: geocode origin/destination.
        let geocode_provider = self.providers.geocode_provider();
        let origin_location = geocode_provider
            .geocode(origin)
            .await?
            .ok_or_else(|| PipelineError::OriginNotFound(origin.to_string()))?;
        let destination_location = geocode_provider
            .geocode(destination)
            .await?
            .ok_or_else(|| PipelineError::DestinationNotFound(destination.to_string()))?;
        progress_cb(10.0);
        async_ops::update_progress(&self.pool, operation_id, 10.0, None).await?;

        // Step 3: calculate route.
        let routing_provider = self.providers.routing_provider();
        let route = routing_provider
            .calculate_route(&origin_location, &destination_location)
            .await?
            .ok_or(PipelineError::NoRoute)?;
        progress_cb(25.0);
        async_ops::update_progress(&self.pool, operation_id, 25.0, None).await?;

        // Step 4: get-or-create RouteSegments.
        let segments =
            segment_engine::get_or_create_for_steps(&self.pool, &route.steps, false, options.version_suffix).await.map_err(PersistenceError::from)?;
        progress_cb(35.0);
        async_ops::update_progress(&self.pool, operation_id, 35.0, None).await?;

        // Step 5: POISearch → POIPersistence → SegmentEngine association for
        // segments that haven't had POIs fetched yet.
        let poi_search_provider = self.providers.poi_search_provider()?;
        let mut tally = SearchAttemptTally::default();
        let mut consecutive_failures = 0u32;
        let segments_needing_search: Vec<_> = segments.iter().filter(|s| s.needs_poi_search()).collect();
        let total_to_search = segments_needing_search.len().max(1);

        for (i, segment) in segments_needing_search.iter().enumerate() {
            let before_failed = tally.failed;
            let discoveries =
                search_pois_for_segment(poi_search_provider.as_ref(), segment, options.categories, options.max_distance_m).await;

            // search_pois_for_segment absorbs per-search-point errors; approximate
            // the tally here by treating an empty result on a segment with search
            // points as one failed attempt, matching the systemic-failure spirit
            // of spec §7 without threading per-call Results back through it.
            tally.attempted += 1;
            if discoveries.is_empty() && !segment.search_points.is_empty() {
                tally.failed += 1;
            }
            consecutive_failures = if tally.failed > before_failed { consecutive_failures + 1 } else { 0 };

            if tally.is_systemic_failure(consecutive_failures) {
                return Err(PipelineError::SystemicUpstreamFailure {
                    failed: tally.failed,
                    attempted: tally.attempted,
                    reason: "POI search failures exceeded the systemic-failure threshold",
                });
            }

            for discovery in discoveries {
                let canonical = poi_persistence::get_or_create_by_provider_id(&self.pool, &discovery.poi)
                    .await
                    .map_err(PersistenceError::from)?;
                let link = crate::models::SegmentPoi {
                    segment_id: segment.id,
                    poi_id: canonical.id,
                    search_point_index: discovery.search_point_index,
                    straight_line_distance_m: discovery.straight_line_distance_m,
                };
                crate::db::pois::insert_segment_poi(&self.pool, &link).await.map_err(PersistenceError::from)?;
            }
            crate::db::segments::mark_pois_fetched(&self.pool, segment.id, chrono::Utc::now())
                .await
                .map_err(PersistenceError::from)?;

            let progress = 35.0 + 35.0 * (i + 1) as f64 / total_to_search as f64;
            progress_cb(progress);
            async_ops::update_progress(&self.pool, operation_id, progress, None).await?;
        }

        // Step 6: optional HERE enrichment.
        if let Some(here) = self.providers.enrichment_provider() {
            let mut pois_to_enrich = Vec::new();
            for segment in &segments {
                for (_, poi) in crate::db::pois::fetch_for_segment(&self.pool, segment.id).await.map_err(PersistenceError::from)? {
                    pois_to_enrich.push(poi);
                }
            }
            crate::here_enrichment::enrich_pois(&self.pool, &here, &mut pois_to_enrich).await;
        }
        progress_cb(75.0);
        async_ops::update_progress(&self.pool, operation_id, 75.0, None).await?;

        // Step 7: create the Map row and assemble it.
        let map = Map {
            id: Uuid::new_v4(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            total_length_km: route.total_distance_km,
            road_id: options.road_id.clone(),
            metadata: serde_json::json!({ "road_names": route.road_names }),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            created_by_user_id: options.user_id,
        };

        let outcome = map_assembly::assemble_map(
            &self.pool,
            geocode_provider.as_ref(),
            routing_provider.as_ref(),
            map.id,
            &segments,
            &route.geometry,
            Some(&origin_city),
            DEFAULT_LOOKBACK_KM,
            None::<&mut DebugCollector>,
        )
        .await
        .map_err(PipelineError::from)?;

        let mut tx = self.pool.begin().await.map_err(PersistenceError::from)?;
        crate::db::maps::insert_map_in_tx(&mut tx, &map).await.map_err(PersistenceError::from)?;
        crate::db::maps::insert_map_segments(&mut tx, &outcome.map_segments).await.map_err(PersistenceError::from)?;
        crate::db::maps::insert_map_pois(&mut tx, &outcome.map_pois).await.map_err(PersistenceError::from)?;
        tx.commit().await.map_err(PersistenceError::from)?;

        for map_poi in &outcome.map_pois {
            if let Err(e) = poi_persistence::mark_referenced(&self.pool, map_poi.poi_id).await {
                warn!(error = %e, poi_id = %map_poi.poi_id, "failed to mark POI referenced");
            }
        }

        progress_cb(100.0);
        info!(map_id = %map.id, n_segments = outcome.map_segments.len(), n_pois = outcome.map_pois.len(), "map assembled");

        Ok(map)
    }

    /// Deletes and recreates a map's segments/POIs in place (Open Question 3,
    /// SPEC_FULL §C.3), preserving the map id and user association.
    pub async fn regenerate_map(
        &self,
        map_id: Uuid,
        options: GenerateMapOptions<'_>,
        progress_cb: impl FnMut(f64),
    ) -> Result<(Map, AsyncOperation), PipelineError> {
        let existing = crate::db::maps::fetch_map(&self.pool, map_id)
            .await
            .map_err(PersistenceError::from)?
            .ok_or_else(|| PersistenceError::NotFound(format!("map {map_id}")))?;

        let unlinked_segment_ids =
            crate::db::maps::delete_map_segments(&self.pool, map_id).await.map_err(PersistenceError::from)?;
        crate::db::maps::delete_map_pois(&self.pool, map_id).await.map_err(PersistenceError::from)?;
        segment_engine::release_segments(&self.pool, &unlinked_segment_ids).await.map_err(PersistenceError::from)?;
        crate::db::maps::delete_map(&self.pool, map_id).await.map_err(PersistenceError::from)?;

        let mut options = options;
        options.user_id = options.user_id.or(existing.created_by_user_id);
        options.road_id = options.road_id.or(existing.road_id.clone());

        self.generate_linear_map(&existing.origin, &existing.destination, options, progress_cb).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_city_extracted_before_first_comma() {
        assert_eq!(extract_origin_city("Belo Horizonte, MG"), "Belo Horizonte");
        assert_eq!(extract_origin_city("Springfield"), "Springfield");
    }

    #[test]
    fn default_categories_exclude_place_types() {
        assert!(!DEFAULT_CATEGORIES.contains(&PoiCategory::City));
        assert!(!DEFAULT_CATEGORIES.contains(&PoiCategory::Town));
        assert!(!DEFAULT_CATEGORIES.contains(&PoiCategory::Other));
        assert!(DEFAULT_CATEGORIES.contains(&PoiCategory::GasStation));
    }
}
