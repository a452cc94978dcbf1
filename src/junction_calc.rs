//! Computes junction coordinate, side-of-road, and access-route distance
//! per POI (spec §4.6).

use crate::geo_utils::{find_closest_point_index, haversine};
use crate::models::{MapSegment, RouteSegment, SegmentPoi, Side};
use crate::providers::GeoProvider;

const NEARBY_THRESHOLD_M: f64 = 500.0;
const ROUTE_INTERSECTION_THRESHOLD_M: f64 = 50.0;
const DETOUR_THRESHOLD_M: f64 = 500.0;

/// A search point promoted to its distance from the map's origin (spec §4.6
/// "Global search points").
#[derive(Debug, Clone, Copy)]
pub struct GlobalSearchPoint {
    pub distance_from_map_origin_km: f64,
    pub lat: f64,
    pub lon: f64,
}

/// All search points across every segment of a map, sorted ascending by
/// distance from the map's origin.
pub fn build_global_search_points(map_segments: &[MapSegment], segments: &[RouteSegment]) -> Vec<GlobalSearchPoint> {
    let mut points: Vec<GlobalSearchPoint> = Vec::new();
    for map_segment in map_segments {
        let Some(segment) = segments.iter().find(|s| s.id == map_segment.segment_id) else {
            continue;
        };
        for sp in &segment.search_points {
            points.push(GlobalSearchPoint {
                distance_from_map_origin_km: map_segment.distance_from_origin_km + sp.distance_from_segment_start_km,
                lat: sp.lat,
                lon: sp.lon,
            });
        }
    }
    points.sort_by(|a, b| a.distance_from_map_origin_km.partial_cmp(&b.distance_from_map_origin_km).unwrap());
    points
}

#[derive(Debug, Clone)]
pub struct JunctionResult {
    pub junction_lat: f64,
    pub junction_lon: f64,
    pub junction_distance_km: f64,
    pub side: Side,
    pub access_distance_km: f64,
    pub requires_detour: bool,
    pub access_route_geometry: Option<Vec<(f64, f64)>>,
}

fn cumulative_km_to_index(geometry: &[(f64, f64)], idx: usize) -> f64 {
    let mut total_m = 0.0;
    for window in geometry[..=idx.min(geometry.len().saturating_sub(1))].windows(2) {
        total_m += haversine(window[0].0, window[0].1, window[1].0, window[1].1);
    }
    total_m / 1000.0
}

/// Cross-product side determination: `left` iff `cross > 0`, `right` iff
/// `cross < 0`, `center` iff `|cross| < 1e-10` or geometry too short
/// (spec §4.6, §3 invariant (b)).
pub fn determine_side(route_geometry: &[(f64, f64)], junction_idx: usize, poi: (f64, f64)) -> Side {
    if route_geometry.len() < 2 {
        return Side::Center;
    }
    let prev_idx = junction_idx.saturating_sub(1);
    let next_idx = (junction_idx + 1).min(route_geometry.len() - 1);
    if prev_idx == next_idx {
        return Side::Center;
    }

    let (prev_lat, prev_lon) = route_geometry[prev_idx];
    let (next_lat, next_lon) = route_geometry[next_idx];
    let (junction_lat, junction_lon) = route_geometry[junction_idx];

    let dx = next_lon - prev_lon;
    let dy = next_lat - prev_lat;
    let px = poi.1 - junction_lon;
    let py = poi.0 - junction_lat;

    let cross = dx * py - dy * px;
    if cross.abs() < 1e-10 {
        Side::Center
    } else if cross > 0.0 {
        Side::Left
    } else {
        Side::Right
    }
}

fn nearby_junction(full_route_geometry: &[(f64, f64)], poi: (f64, f64)) -> (usize, (f64, f64)) {
    let idx = find_closest_point_index(full_route_geometry, poi);
    (idx, full_route_geometry.get(idx).copied().unwrap_or((0.0, 0.0)))
}

/// Finds the first point along `access_route_geometry` whose closest point
/// on `main_route_geometry` is under 50 m, returning that main-route index
/// (spec §4.6 step 4).
fn find_route_intersection(main_route_geometry: &[(f64, f64)], access_route_geometry: &[(f64, f64)]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for &(access_lat, access_lon) in access_route_geometry {
        let idx = find_closest_point_index(main_route_geometry, (access_lat, access_lon));
        let (main_lat, main_lon) = main_route_geometry[idx];
        let distance_m = haversine(access_lat, access_lon, main_lat, main_lon);
        if distance_m < ROUTE_INTERSECTION_THRESHOLD_M {
            let better = match best {
                Some((_, best_distance)) => distance_m < best_distance,
                None => true,
            };
            if better {
                best = Some((idx, distance_m));
            }
        }
    }
    best.map(|(idx, _)| idx)
}

fn find_lookback_point(
    global_search_points: &[GlobalSearchPoint],
    poi_distance_km: f64,
    lookback_km: f64,
) -> Option<GlobalSearchPoint> {
    if global_search_points.is_empty() {
        return None;
    }
    let cutoff = poi_distance_km - lookback_km;
    global_search_points
        .iter()
        .rev()
        .find(|sp| sp.distance_from_map_origin_km <= cutoff)
        .copied()
        .or_else(|| global_search_points.first().copied())
}

/// Computes the junction for one POI, or `None` to skip it (routing
/// failure in the distant-POI branch; spec §4.6, §7).
pub async fn compute_junction(
    poi: (f64, f64),
    segment_poi: &SegmentPoi,
    map_segment: &MapSegment,
    segment: &RouteSegment,
    full_route_geometry: &[(f64, f64)],
    global_search_points: &[GlobalSearchPoint],
    lookback_km: f64,
    routing_provider: &dyn GeoProvider,
) -> Option<JunctionResult> {
    let straight_line_m = segment_poi.straight_line_distance_m as f64;

    if straight_line_m <= NEARBY_THRESHOLD_M {
        let (junction_idx, junction) = nearby_junction(full_route_geometry, poi);
        let junction_distance_km = cumulative_km_to_index(full_route_geometry, junction_idx);
        let side = determine_side(full_route_geometry, junction_idx, poi);
        return Some(JunctionResult {
            junction_lat: junction.0,
            junction_lon: junction.1,
            junction_distance_km,
            side,
            access_distance_km: straight_line_m / 1000.0,
            requires_detour: false,
            access_route_geometry: None,
        });
    }

    let discovery_sp_distance_km = segment
        .search_points
        .iter()
        .find(|sp| sp.index == segment_poi.search_point_index)
        .map(|sp| map_segment.distance_from_origin_km + sp.distance_from_segment_start_km)
        .unwrap_or(map_segment.distance_from_origin_km);
    let poi_distance_km = discovery_sp_distance_km + straight_line_m / 1000.0;

    let lookback = find_lookback_point(global_search_points, poi_distance_km, lookback_km)?;
    let lookback_location = crate::models::GeoLocation {
        latitude: lookback.lat,
        longitude: lookback.lon,
        display_name: None,
        city: None,
        state: None,
    };
    let poi_location = crate::models::GeoLocation {
        latitude: poi.0,
        longitude: poi.1,
        display_name: None,
        city: None,
        state: None,
    };

    let access_route = routing_provider.calculate_route(&lookback_location, &poi_location).await.ok().flatten()?;

    let junction_idx = find_route_intersection(full_route_geometry, &access_route.geometry)?;
    let junction = full_route_geometry[junction_idx];
    let junction_distance_km = cumulative_km_to_index(full_route_geometry, junction_idx);
    let access_distance_km = haversine(junction.0, junction.1, poi.0, poi.1) / 1000.0;

    Some(JunctionResult {
        junction_lat: junction.0,
        junction_lon: junction.1,
        junction_distance_km,
        side: determine_side(full_route_geometry, junction_idx, poi),
        access_distance_km,
        requires_detour: access_distance_km * 1000.0 > DETOUR_THRESHOLD_M,
        access_route_geometry: Some(access_route.geometry),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_flips_with_geometry_order() {
        let geometry = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]; // heading due north
        let poi_east = (1.0, 0.1);
        let forward = determine_side(&geometry, 1, poi_east);

        let reversed: Vec<_> = geometry.iter().rev().copied().collect();
        let backward = determine_side(&reversed, 1, poi_east);

        assert_ne!(forward, backward);
    }

    #[test]
    fn poi_on_route_is_center() {
        let geometry = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)];
        let side = determine_side(&geometry, 1, (1.0, 0.0));
        assert_eq!(side, Side::Center);
    }

    #[test]
    fn lookback_finds_latest_point_within_window() {
        let points = vec![
            GlobalSearchPoint { distance_from_map_origin_km: 0.0, lat: 0.0, lon: 0.0 },
            GlobalSearchPoint { distance_from_map_origin_km: 20.0, lat: 0.0, lon: 0.2 },
            GlobalSearchPoint { distance_from_map_origin_km: 35.0, lat: 0.0, lon: 0.35 },
        ];
        let lookback = find_lookback_point(&points, 47.0, 10.0).unwrap();
        assert_eq!(lookback.distance_from_map_origin_km, 35.0);
    }

    #[test]
    fn lookback_falls_back_to_first_point_when_none_qualify() {
        let points = vec![GlobalSearchPoint { distance_from_map_origin_km: 100.0, lat: 0.0, lon: 0.0 }];
        let lookback = find_lookback_point(&points, 5.0, 10.0).unwrap();
        assert_eq!(lookback.distance_from_map_origin_km, 100.0);
    }

    #[test]
    fn route_intersection_requires_sub_fifty_meter_match() {
        let main = vec![(0.0, 0.0), (0.0, 0.001), (0.0, 0.002)];
        let access_close = vec![(10.0, 10.0), (0.0, 0.001)];
        assert_eq!(find_route_intersection(&main, &access_close), Some(1));

        let access_far = vec![(10.0, 10.0), (20.0, 20.0)];
        assert_eq!(find_route_intersection(&main, &access_far), None);
    }
}
