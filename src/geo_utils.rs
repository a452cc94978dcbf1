//! Pure geographic math: Haversine distance, route projection, interpolation.
//!
//! Every function here is stateless and total — empty geometry inputs
//! deterministically return `(0.0, 0.0)` / `0.0` / `0` rather than panicking
//! (spec §4.1).

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

/// Index of the closest point in `geometry` to `target`, by straight
/// Euclidean distance in degree-space (matches the original's simplified
/// nearest-point search, which does not need geodesic precision here).
pub fn find_closest_point_index(geometry: &[(f64, f64)], target: (f64, f64)) -> usize {
    if geometry.is_empty() {
        return 0;
    }
    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &(lat, lon)) in geometry.iter().enumerate() {
        let dist = ((lat - target.0).powi(2) + (lon - target.1).powi(2)).sqrt();
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

/// Index of the geometry segment `[i, i+1]` whose midpoint is closest to
/// `target` (Haversine distance). Returns 0 when geometry has fewer than 2
/// points.
pub fn find_closest_segment_index(geometry: &[(f64, f64)], target: (f64, f64)) -> usize {
    if geometry.len() < 2 {
        return 0;
    }
    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;
    for i in 0..geometry.len() - 1 {
        let mid = midpoint(geometry[i], geometry[i + 1]);
        let dist = haversine(target.0, target.1, mid.0, mid.1);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

/// Distance in km from the start of `geometry` to the segment closest to
/// `target_point` (spec §4.1). Projection is by closest-segment-midpoint,
/// matching the original's simplified approach rather than a true
/// point-to-segment projection.
pub fn distance_along_route(geometry: &[(f64, f64)], target_point: (f64, f64)) -> f64 {
    if geometry.is_empty() {
        return 0.0;
    }
    let closest_segment_idx = find_closest_segment_index(geometry, target_point);

    let mut cumulative_m = 0.0;
    for i in 0..closest_segment_idx {
        cumulative_m += haversine(
            geometry[i].0,
            geometry[i].1,
            geometry[i + 1].0,
            geometry[i + 1].1,
        );
    }
    cumulative_m / 1000.0
}

/// Distance in km from `start_point` (an arbitrary point along the route,
/// e.g. a junction) to the end of `geometry`. Retained per SPEC_FULL §B.1 —
/// not currently wired into any pipeline path, matching the original's own
/// loose usage.
pub fn distance_from_point_to_end(geometry: &[(f64, f64)], start_point: (f64, f64)) -> f64 {
    if geometry.len() < 2 {
        return 0.0;
    }

    let mut closest_segment_idx = 0;
    let mut best_dist = f64::INFINITY;
    let mut projection_point = start_point;
    for i in 0..geometry.len() - 1 {
        let mid = midpoint(geometry[i], geometry[i + 1]);
        let dist = haversine(start_point.0, start_point.1, mid.0, mid.1);
        if dist < best_dist {
            best_dist = dist;
            closest_segment_idx = i;
            projection_point = geometry[i + 1];
        }
    }

    let mut cumulative_m = 0.0;
    for i in (closest_segment_idx + 1)..(geometry.len() - 1) {
        cumulative_m += haversine(
            geometry[i].0,
            geometry[i].1,
            geometry[i + 1].0,
            geometry[i + 1].1,
        );
    }
    cumulative_m += haversine(
        start_point.0,
        start_point.1,
        projection_point.0,
        projection_point.1,
    );

    cumulative_m / 1000.0
}

/// Linear interpolation of a coordinate at `target_km` along `geometry`,
/// treating the geometry as evenly spaced over `total_km` (spec §4.1).
pub fn interpolate_at_distance(
    geometry: &[(f64, f64)],
    target_km: f64,
    total_km: f64,
) -> (f64, f64) {
    if geometry.is_empty() {
        return (0.0, 0.0);
    }
    if target_km <= 0.0 {
        return geometry[0];
    }
    if target_km >= total_km {
        return geometry[geometry.len() - 1];
    }

    let ratio = target_km / total_km;
    let total_points = geometry.len();
    let target_index = ratio * (total_points - 1) as f64;

    let index_before = target_index.floor() as usize;
    let index_after = (index_before + 1).min(total_points - 1);

    if index_before == index_after {
        return geometry[index_before];
    }

    let before = geometry[index_before];
    let after = geometry[index_after];
    let local_ratio = target_index - index_before as f64;

    (
        before.0 + (after.0 - before.0) * local_ratio,
        before.1 + (after.1 - before.1) * local_ratio,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_identical_points() {
        assert!(haversine(-19.9191, -43.9386, -19.9191, -43.9386) < 1e-6);
    }

    #[test]
    fn haversine_belo_horizonte_to_sao_paulo_is_roughly_right() {
        let d_km = haversine(-19.9191, -43.9386, -23.5505, -46.6333) / 1000.0;
        assert!((480.0..600.0).contains(&d_km), "got {d_km} km");
    }

    #[test]
    fn empty_geometry_returns_zero_distance() {
        assert_eq!(distance_along_route(&[], (0.0, 0.0)), 0.0);
    }

    #[test]
    fn empty_geometry_interpolates_to_origin() {
        assert_eq!(interpolate_at_distance(&[], 5.0, 10.0), (0.0, 0.0));
    }

    #[test]
    fn interpolate_at_zero_returns_first_point() {
        let geom = vec![(0.0, 0.0), (1.0, 1.0)];
        assert_eq!(interpolate_at_distance(&geom, 0.0, 10.0), (0.0, 0.0));
    }

    #[test]
    fn interpolate_at_total_returns_last_point() {
        let geom = vec![(0.0, 0.0), (1.0, 1.0)];
        assert_eq!(interpolate_at_distance(&geom, 10.0, 10.0), (1.0, 1.0));
    }

    #[test]
    fn interpolate_halfway_is_midpoint_on_two_point_geometry() {
        let geom = vec![(0.0, 0.0), (2.0, 2.0)];
        let (lat, lon) = interpolate_at_distance(&geom, 5.0, 10.0);
        assert!((lat - 1.0).abs() < 1e-9);
        assert!((lon - 1.0).abs() < 1e-9);
    }

    #[test]
    fn find_closest_point_index_picks_nearest() {
        let geom = vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        assert_eq!(find_closest_point_index(&geom, (1.9, 1.9)), 2);
    }

    #[test]
    fn find_closest_segment_index_handles_short_geometry() {
        assert_eq!(find_closest_segment_index(&[(0.0, 0.0)], (1.0, 1.0)), 0);
    }
}
