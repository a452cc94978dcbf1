//! Raw SQL for the `route_segments` table (spec §3/§4.4).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{RouteSegment, SearchPoint};

#[derive(Debug, sqlx::FromRow)]
struct SegmentRow {
    id: Uuid,
    segment_hash: String,
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
    length_km: f64,
    road_name: Option<String>,
    geometry: Value,
    search_points: Value,
    usage_count: i64,
    pois_fetched_at: Option<DateTime<Utc>>,
}

impl From<SegmentRow> for RouteSegment {
    fn from(row: SegmentRow) -> Self {
        let geometry: Vec<(f64, f64)> = serde_json::from_value(row.geometry).unwrap_or_default();
        let search_points: Vec<SearchPoint> = serde_json::from_value(row.search_points).unwrap_or_default();
        RouteSegment {
            id: row.id,
            segment_hash: row.segment_hash,
            start_lat: row.start_lat,
            start_lon: row.start_lon,
            end_lat: row.end_lat,
            end_lon: row.end_lon,
            length_km: row.length_km,
            road_name: row.road_name,
            geometry,
            search_points,
            usage_count: row.usage_count,
            pois_fetched_at: row.pois_fetched_at,
        }
    }
}

pub async fn fetch_by_hashes(pool: &PgPool, hashes: &[String]) -> Result<Vec<RouteSegment>, sqlx::Error> {
    if hashes.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<SegmentRow> = sqlx::query_as(
        r#"
        SELECT id, segment_hash, start_lat, start_lon, end_lat, end_lon, length_km,
               road_name, geometry, search_points, usage_count, pois_fetched_at
        FROM route_segments
        WHERE segment_hash = ANY($1)
        "#,
    )
    .bind(hashes)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn fetch_by_id(pool: &PgPool, id: Uuid) -> Result<Option<RouteSegment>, sqlx::Error> {
    let row: Option<SegmentRow> = sqlx::query_as(
        r#"
        SELECT id, segment_hash, start_lat, start_lon, end_lat, end_lon, length_km,
               road_name, geometry, search_points, usage_count, pois_fetched_at
        FROM route_segments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

/// Inserts a brand-new segment with `usage_count = 1`. On a `segment_hash`
/// uniqueness race, the caller should fall back to `increment_usage` against
/// the winner (spec §5 — "the loser reads and increments usage_count").
pub async fn insert_new(pool: &PgPool, segment: &RouteSegment) -> Result<RouteSegment, sqlx::Error> {
    let geometry = serde_json::to_value(&segment.geometry).unwrap_or(Value::Array(vec![]));
    let search_points = serde_json::to_value(&segment.search_points).unwrap_or(Value::Array(vec![]));

    let row: SegmentRow = sqlx::query_as(
        r#"
        INSERT INTO route_segments
            (id, segment_hash, start_lat, start_lon, end_lat, end_lon, length_km,
             road_name, geometry, search_points, usage_count, pois_fetched_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1, NULL)
        RETURNING id, segment_hash, start_lat, start_lon, end_lat, end_lon, length_km,
                  road_name, geometry, search_points, usage_count, pois_fetched_at
        "#,
    )
    .bind(segment.id)
    .bind(&segment.segment_hash)
    .bind(segment.start_lat)
    .bind(segment.start_lon)
    .bind(segment.end_lat)
    .bind(segment.end_lon)
    .bind(segment.length_km)
    .bind(&segment.road_name)
    .bind(geometry)
    .bind(search_points)
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}

pub async fn increment_usage(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE route_segments SET usage_count = usage_count + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Never drives `usage_count` below zero (spec §8 property 8).
pub async fn bulk_decrement_usage(pool: &PgPool, ids: &[Uuid]) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "UPDATE route_segments SET usage_count = GREATEST(usage_count - 1, 0) WHERE id = ANY($1)",
    )
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_pois_fetched(pool: &PgPool, id: Uuid, fetched_at: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE route_segments SET pois_fetched_at = $2 WHERE id = $1")
        .bind(id)
        .bind(fetched_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn find_orphans(pool: &PgPool) -> Result<Vec<RouteSegment>, sqlx::Error> {
    let rows: Vec<SegmentRow> = sqlx::query_as(
        r#"
        SELECT s.id, s.segment_hash, s.start_lat, s.start_lon, s.end_lat, s.end_lon, s.length_km,
               s.road_name, s.geometry, s.search_points, s.usage_count, s.pois_fetched_at
        FROM route_segments s
        WHERE s.usage_count = 0
          AND NOT EXISTS (SELECT 1 FROM map_segments ms WHERE ms.segment_id = s.id)
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM route_segments WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}
