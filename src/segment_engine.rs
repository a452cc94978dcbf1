//! Content-addressed route-segment reuse and search-point generation (spec §4.4).

use sqlx::PgPool;
use uuid::Uuid;

use crate::geo_utils::{haversine, interpolate_at_distance};
use crate::models::{RouteSegment, RouteStep, SearchPoint};

/// `md5("{slat:.4f},{slon:.4f}|{elat:.4f},{elon:.4f}"["|"version_suffix])`
/// (spec §3/§4.4). 4-decimal rounding (~11 m) groups near-identical steps
/// across different map requests.
pub fn segment_hash(start: (f64, f64), end: (f64, f64), version_suffix: Option<&str>) -> String {
    let mut input = format!("{:.4},{:.4}|{:.4},{:.4}", start.0, start.1, end.0, end.1);
    if let Some(suffix) = version_suffix {
        input.push('|');
        input.push_str(suffix);
    }
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Search points at 1.0 km intervals, `0..=floor(length_km)`. Segments
/// shorter than 1.0 km emit none (spec §3 invariant (b), §4.4, §8 property 2).
pub fn generate_search_points(geometry: &[(f64, f64)], length_km: f64) -> Vec<SearchPoint> {
    if length_km < 1.0 || geometry.len() < 2 {
        return Vec::new();
    }

    let mut points = Vec::new();
    let mut target_km = 0.0;
    let mut index = 0;
    while target_km <= length_km + 1e-9 {
        let (lat, lon) = interpolate_at_distance(geometry, target_km, length_km);
        points.push(SearchPoint {
            index,
            lat,
            lon,
            distance_from_segment_start_km: target_km,
        });
        index += 1;
        target_km += 1.0;
    }
    points
}

fn step_length_km(step: &RouteStep) -> f64 {
    if step.distance_km > 0.0 {
        return step.distance_km;
    }
    let mut total_m = 0.0;
    for window in step.geometry.windows(2) {
        total_m += haversine(window[0].0, window[0].1, window[1].0, window[1].1);
    }
    total_m / 1000.0
}

fn new_segment_for_step(step: &RouteStep, version_suffix: Option<&str>) -> RouteSegment {
    let length_km = step_length_km(step);
    let search_points = generate_search_points(&step.geometry, length_km);
    RouteSegment {
        id: Uuid::new_v4(),
        segment_hash: segment_hash(step.start_coords, step.end_coords, version_suffix),
        start_lat: step.start_coords.0,
        start_lon: step.start_coords.1,
        end_lat: step.end_coords.0,
        end_lon: step.end_coords.1,
        length_km,
        road_name: step.road_name.clone(),
        geometry: step.geometry.clone(),
        search_points,
        usage_count: 0,
        pois_fetched_at: None,
    }
}

/// Resolves each step to a [`RouteSegment`], reusing existing rows by hash
/// and incrementing their `usage_count`, or creating new ones. Returns
/// segments in the same order as `steps` (spec §4.4, §5).
pub async fn get_or_create_for_steps(
    pool: &PgPool,
    steps: &[RouteStep],
    force_new: bool,
    version_suffix: Option<&str>,
) -> Result<Vec<RouteSegment>, sqlx::Error> {
    if force_new {
        let mut created = Vec::with_capacity(steps.len());
        for step in steps {
            let segment = new_segment_for_step(step, version_suffix);
            created.push(crate::db::segments::insert_new(pool, &segment).await?);
        }
        return Ok(created);
    }

    let hashes: Vec<String> = steps
        .iter()
        .map(|s| segment_hash(s.start_coords, s.end_coords, version_suffix))
        .collect();
    let existing = crate::db::segments::fetch_by_hashes(pool, &hashes).await?;

    let mut resolved = Vec::with_capacity(steps.len());
    for (step, hash) in steps.iter().zip(hashes.iter()) {
        if let Some(found) = existing.iter().find(|s| &s.segment_hash == hash) {
            crate::db::segments::increment_usage(pool, found.id).await?;
            let mut reused = found.clone();
            reused.usage_count += 1;
            resolved.push(reused);
            continue;
        }

        let segment = new_segment_for_step(step, version_suffix);
        match crate::db::segments::insert_new(pool, &segment).await {
            Ok(inserted) => resolved.push(inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // Lost the race on `segment_hash`: another writer inserted
                // first. Read the winner and increment it (spec §5).
                let winner = crate::db::segments::fetch_by_hashes(pool, std::slice::from_ref(hash))
                    .await?
                    .into_iter()
                    .next()
                    .expect("unique violation implies a winning row exists");
                crate::db::segments::increment_usage(pool, winner.id).await?;
                let mut reused = winner;
                reused.usage_count += 1;
                resolved.push(reused);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(resolved)
}

/// Releases a map's hold on its segments (spec §4.4 — called on map
/// deletion, the mirror image of the increments applied during assembly).
pub async fn release_segments(pool: &PgPool, segment_ids: &[Uuid]) -> Result<(), sqlx::Error> {
    crate::db::segments::bulk_decrement_usage(pool, segment_ids).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_under_sub_precision_perturbation() {
        let a = segment_hash((-19.91910, -43.93860), (-19.92000, -43.94000), None);
        let b = segment_hash((-19.919104, -43.938604), (-19.920001, -43.940004), None);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_changes_with_version_suffix() {
        let a = segment_hash((0.0, 0.0), (1.0, 1.0), None);
        let b = segment_hash((0.0, 0.0), (1.0, 1.0), Some("v2"));
        assert_ne!(a, b);
    }

    #[test]
    fn sub_kilometer_segment_has_no_search_points() {
        let geometry = vec![(0.0, 0.0), (0.001, 0.001)];
        assert!(generate_search_points(&geometry, 0.5).is_empty());
    }

    #[test]
    fn search_points_at_one_km_intervals_match_floor_plus_one() {
        let geometry = vec![(0.0, 0.0), (0.0, 0.05)]; // ~5.5 km straight line
        let length_km = 5.5;
        let points = generate_search_points(&geometry, length_km);
        assert_eq!(points.len(), length_km.floor() as usize + 1);
        for (i, point) in points.iter().enumerate() {
            assert_eq!(point.index, i as i32);
        }
        for window in points.windows(2) {
            let delta = window[1].distance_from_segment_start_km - window[0].distance_from_segment_start_km;
            assert!((delta - 1.0).abs() < 1e-6);
        }
    }
}
