//! Orchestrates SegmentEngine/POISearch/JunctionCalc output into
//! `Map` + `MapSegment` + `MapPOI` records (spec §4.7).

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::junction_calc::{build_global_search_points, compute_junction};
use crate::models::{MapPoi, MapSegment, Poi, RouteSegment};
use crate::providers::GeoProvider;

pub struct AssemblyOutcome {
    pub map_segments: Vec<MapSegment>,
    pub map_pois: Vec<MapPoi>,
    pub poi_id_to_index: HashMap<Uuid, usize>,
}

/// Per-POI calculation trace, recorded only when a debug collector is
/// supplied (spec §4.7 step 8).
#[derive(Debug, Clone)]
pub struct PoiDebugTrace {
    pub poi_id: Uuid,
    pub route_window: Vec<(f64, f64)>,
    pub access_route_geometry: Option<Vec<(f64, f64)>>,
    pub cross_product_inputs: (f64, f64, f64, f64),
}

#[derive(Default)]
pub struct DebugCollector {
    pub traces: Vec<PoiDebugTrace>,
}

fn build_map_segments(map_id: Uuid, segments: &[RouteSegment]) -> Vec<MapSegment> {
    let mut cumulative_km = 0.0;
    let mut map_segments = Vec::with_capacity(segments.len());
    for (order, segment) in segments.iter().enumerate() {
        map_segments.push(MapSegment {
            map_id,
            segment_id: segment.id,
            sequence_order: order as i32,
            distance_from_origin_km: cumulative_km,
        });
        cumulative_km += segment.length_km;
    }
    map_segments
}

fn route_window_around(route_geometry: &[(f64, f64)], junction_idx: usize, radius: usize) -> Vec<(f64, f64)> {
    let start = junction_idx.saturating_sub(radius);
    let end = (junction_idx + radius).min(route_geometry.len().saturating_sub(1));
    route_geometry[start..=end.max(start)].to_vec()
}

/// Runs the full assembly pipeline for a map whose segments are already
/// persisted [`RouteSegment`]s in strict route order. Reads are unordered
/// with respect to writes elsewhere in the pipeline; the final MapSegment/
/// MapPOI insert is the caller's responsibility to wrap in a transaction
/// alongside the `Map` row itself (spec §5 — "single transaction").
pub async fn assemble_map(
    pool: &PgPool,
    geocode_provider: &dyn GeoProvider,
    routing_provider: &dyn GeoProvider,
    map_id: Uuid,
    segments: &[RouteSegment],
    route_geometry: &[(f64, f64)],
    origin_city: Option<&str>,
    lookback_km: f64,
    mut debug: Option<&mut DebugCollector>,
) -> Result<AssemblyOutcome, PersistenceError> {
    // Step 1: MapSegments, in input order (which IS map order).
    let map_segments = build_map_segments(map_id, segments);

    // Step 2: global search points for the lookback heuristic.
    let global_search_points = build_global_search_points(&map_segments, segments);

    // Step 3: candidate SegmentPOIs with eager POI data.
    let mut candidates: Vec<(crate::models::SegmentPoi, Poi, MapSegment, RouteSegment)> = Vec::new();
    for map_segment in &map_segments {
        let Some(segment) = segments.iter().find(|s| s.id == map_segment.segment_id) else {
            continue;
        };
        let pairs = crate::db::pois::fetch_for_segment(pool, segment.id).await?;
        for (segment_poi, poi) in pairs {
            candidates.push((segment_poi, poi, *map_segment, segment.clone()));
        }
    }

    // Step 4: pre-enrich city for POIs lacking one.
    let mut city_cache: HashMap<Uuid, Option<String>> = HashMap::new();
    for (_, poi, _, _) in &candidates {
        if poi.city.is_some() || city_cache.contains_key(&poi.id) {
            continue;
        }
        let resolved = match geocode_provider
            .reverse_geocode(poi.latitude, poi.longitude, poi.name.as_deref())
            .await
        {
            Ok(Some(location)) => location.city,
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, poi_id = %poi.id, "reverse geocode for city pre-enrichment failed");
                None
            }
        };
        city_cache.insert(poi.id, resolved);
    }
    for (_, poi, _, _) in &mut candidates {
        if poi.city.is_none() {
            if let Some(Some(city)) = city_cache.get(&poi.id) {
                poi.city = Some(city.clone());
            }
        }
    }

    // Step 5: filter disabled and origin-city POIs before computing junctions.
    let origin_city_normalized = origin_city.map(|c| c.trim().to_lowercase());
    candidates.retain(|(_, poi, _, _)| {
        if poi.is_disabled {
            return false;
        }
        if let (Some(origin), Some(city)) = (&origin_city_normalized, &poi.city) {
            if city.trim().to_lowercase() == *origin {
                return false;
            }
        }
        true
    });

    // Step 6: compute junctions, deduplicating by POI id keeping the
    // smallest access_distance_km.
    let mut best_by_poi: HashMap<Uuid, (MapPoi, Poi)> = HashMap::new();
    for (segment_poi, poi, map_segment, segment) in &candidates {
        let junction = compute_junction(
            (poi.latitude, poi.longitude),
            segment_poi,
            map_segment,
            segment,
            route_geometry,
            &global_search_points,
            lookback_km,
            routing_provider,
        )
        .await;

        let Some(junction) = junction else {
            debug!(poi_id = %poi.id, "junction computation skipped POI (routing failure or no intersection)");
            continue;
        };

        if let Some(collector) = debug.as_deref_mut() {
            let junction_idx = crate::geo_utils::find_closest_point_index(
                route_geometry,
                (junction.junction_lat, junction.junction_lon),
            );
            collector.traces.push(PoiDebugTrace {
                poi_id: poi.id,
                route_window: route_window_around(route_geometry, junction_idx, 50),
                access_route_geometry: junction.access_route_geometry.clone(),
                cross_product_inputs: (junction.junction_lat, junction.junction_lon, poi.latitude, poi.longitude),
            });
        }

        let map_poi = MapPoi {
            map_id,
            poi_id: poi.id,
            segment_index: map_segment.sequence_order,
            distance_from_origin_km: junction.junction_distance_km,
            distance_from_road_meters: junction.access_distance_km * 1000.0,
            side: junction.side,
            junction_lat: junction.junction_lat,
            junction_lon: junction.junction_lon,
            junction_distance_km: junction.junction_distance_km,
            requires_detour: junction.requires_detour,
            quality_score: poi.quality_score,
        };

        match best_by_poi.get(&poi.id) {
            Some((existing, _)) if existing.distance_from_road_meters <= map_poi.distance_from_road_meters => {}
            _ => {
                best_by_poi.insert(poi.id, (map_poi, poi.clone()));
            }
        }
    }

    let mut map_pois: Vec<MapPoi> = best_by_poi.values().map(|(map_poi, _)| map_poi.clone()).collect();
    map_pois.sort_by(|a, b| a.distance_from_origin_km.partial_cmp(&b.distance_from_origin_km).unwrap());

    let poi_id_to_index = map_pois.iter().enumerate().map(|(i, p)| (p.poi_id, i)).collect();

    Ok(AssemblyOutcome { map_segments, map_pois, poi_id_to_index })
}

/// Segment/POI/side counts for a previously-assembled map (spec §4.7
/// "statistics helper").
pub fn compute_statistics(
    map_segments: &[MapSegment],
    map_pois: &[MapPoi],
    poi_categories: &HashMap<Uuid, crate::models::PoiCategory>,
) -> crate::models::MapStatistics {
    let mut pois_by_type: HashMap<crate::models::PoiCategory, usize> = HashMap::new();
    let mut pois_by_side: HashMap<String, usize> = HashMap::new();

    for map_poi in map_pois {
        if let Some(category) = poi_categories.get(&map_poi.poi_id) {
            *pois_by_type.entry(*category).or_insert(0) += 1;
        }
        *pois_by_side.entry(map_poi.side.to_string()).or_insert(0) += 1;
    }

    let total_distance_km = map_segments.iter().map(|s| s.distance_from_origin_km).fold(0.0, f64::max);

    crate::models::MapStatistics {
        segment_count: map_segments.len(),
        poi_count: map_pois.len(),
        pois_by_type,
        pois_by_side,
        total_distance_km,
    }
}
