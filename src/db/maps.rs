//! Raw SQL for `maps`, `map_segments`, and `map_pois` (spec §3/§4.7).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Map, MapPoi, MapSegment, Side};

#[derive(Debug, sqlx::FromRow)]
struct MapRow {
    id: Uuid,
    origin: String,
    destination: String,
    total_length_km: f64,
    road_id: Option<String>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by_user_id: Option<Uuid>,
}

impl From<MapRow> for Map {
    fn from(row: MapRow) -> Self {
        Map {
            id: row.id,
            origin: row.origin,
            destination: row.destination,
            total_length_km: row.total_length_km,
            road_id: row.road_id,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by_user_id: row.created_by_user_id,
        }
    }
}

const INSERT_MAP_SQL: &str = r#"
    INSERT INTO maps (id, origin, destination, total_length_km, road_id, metadata,
                       created_at, updated_at, created_by_user_id)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
    RETURNING id, origin, destination, total_length_km, road_id, metadata,
              created_at, updated_at, created_by_user_id
"#;

pub async fn insert_map(pool: &PgPool, map: &Map) -> Result<Map, sqlx::Error> {
    let row: MapRow = sqlx::query_as(INSERT_MAP_SQL)
        .bind(map.id)
        .bind(&map.origin)
        .bind(&map.destination)
        .bind(map.total_length_km)
        .bind(&map.road_id)
        .bind(&map.metadata)
        .bind(map.created_at)
        .bind(map.created_by_user_id)
        .fetch_one(pool)
        .await?;
    Ok(row.into())
}

/// Same insert, inside the caller's transaction — used so `Map` + MapSegments
/// + MapPOIs commit atomically (spec §5).
pub async fn insert_map_in_tx(tx: &mut Transaction<'_, Postgres>, map: &Map) -> Result<Map, sqlx::Error> {
    let row: MapRow = sqlx::query_as(INSERT_MAP_SQL)
        .bind(map.id)
        .bind(&map.origin)
        .bind(&map.destination)
        .bind(map.total_length_km)
        .bind(&map.road_id)
        .bind(&map.metadata)
        .bind(map.created_at)
        .bind(map.created_by_user_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(row.into())
}

pub async fn fetch_map(pool: &PgPool, id: Uuid) -> Result<Option<Map>, sqlx::Error> {
    let row: Option<MapRow> = sqlx::query_as(
        r#"
        SELECT id, origin, destination, total_length_km, road_id, metadata,
               created_at, updated_at, created_by_user_id
        FROM maps WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn list_maps(pool: &PgPool, user_id: Option<Uuid>, limit: i64) -> Result<Vec<Map>, sqlx::Error> {
    let rows: Vec<MapRow> = sqlx::query_as(
        r#"
        SELECT id, origin, destination, total_length_km, road_id, metadata,
               created_at, updated_at, created_by_user_id
        FROM maps
        WHERE $1::uuid IS NULL OR created_by_user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn delete_map(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM maps WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub async fn insert_map_segments(
    tx: &mut Transaction<'_, Postgres>,
    segments: &[MapSegment],
) -> Result<(), sqlx::Error> {
    for segment in segments {
        sqlx::query(
            r#"
            INSERT INTO map_segments (map_id, segment_id, sequence_order, distance_from_origin_km)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(segment.map_id)
        .bind(segment.segment_id)
        .bind(segment.sequence_order)
        .bind(segment.distance_from_origin_km)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct MapSegmentRow {
    map_id: Uuid,
    segment_id: Uuid,
    sequence_order: i32,
    distance_from_origin_km: f64,
}

impl From<MapSegmentRow> for MapSegment {
    fn from(row: MapSegmentRow) -> Self {
        MapSegment {
            map_id: row.map_id,
            segment_id: row.segment_id,
            sequence_order: row.sequence_order,
            distance_from_origin_km: row.distance_from_origin_km,
        }
    }
}

pub async fn fetch_map_segments(pool: &PgPool, map_id: Uuid) -> Result<Vec<MapSegment>, sqlx::Error> {
    let rows: Vec<MapSegmentRow> = sqlx::query_as(
        r#"
        SELECT map_id, segment_id, sequence_order, distance_from_origin_km
        FROM map_segments WHERE map_id = $1 ORDER BY sequence_order
        "#,
    )
    .bind(map_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Returns the segment ids unlinked, for the caller to `bulk_decrement_usage`.
pub async fn delete_map_segments(pool: &PgPool, map_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let ids: Vec<Uuid> = sqlx::query_scalar("DELETE FROM map_segments WHERE map_id = $1 RETURNING segment_id")
        .bind(map_id)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

fn side_to_str(side: Side) -> String {
    side.to_string()
}

fn side_from_str(s: &str) -> Side {
    match s {
        "left" => Side::Left,
        "right" => Side::Right,
        _ => Side::Center,
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MapPoiRow {
    map_id: Uuid,
    poi_id: Uuid,
    segment_index: i32,
    distance_from_origin_km: f64,
    distance_from_road_meters: f64,
    side: String,
    junction_lat: f64,
    junction_lon: f64,
    junction_distance_km: f64,
    requires_detour: bool,
    quality_score: f64,
}

impl From<MapPoiRow> for MapPoi {
    fn from(row: MapPoiRow) -> Self {
        MapPoi {
            map_id: row.map_id,
            poi_id: row.poi_id,
            segment_index: row.segment_index,
            distance_from_origin_km: row.distance_from_origin_km,
            distance_from_road_meters: row.distance_from_road_meters,
            side: side_from_str(&row.side),
            junction_lat: row.junction_lat,
            junction_lon: row.junction_lon,
            junction_distance_km: row.junction_distance_km,
            requires_detour: row.requires_detour,
            quality_score: row.quality_score,
        }
    }
}

pub async fn insert_map_pois(tx: &mut Transaction<'_, Postgres>, pois: &[MapPoi]) -> Result<(), sqlx::Error> {
    for poi in pois {
        sqlx::query(
            r#"
            INSERT INTO map_pois (map_id, poi_id, segment_index, distance_from_origin_km,
                                   distance_from_road_meters, side, junction_lat, junction_lon,
                                   junction_distance_km, requires_detour, quality_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (map_id, poi_id) DO UPDATE SET
                segment_index = EXCLUDED.segment_index,
                distance_from_origin_km = EXCLUDED.distance_from_origin_km,
                distance_from_road_meters = EXCLUDED.distance_from_road_meters,
                side = EXCLUDED.side,
                junction_lat = EXCLUDED.junction_lat,
                junction_lon = EXCLUDED.junction_lon,
                junction_distance_km = EXCLUDED.junction_distance_km,
                requires_detour = EXCLUDED.requires_detour,
                quality_score = EXCLUDED.quality_score
            "#,
        )
        .bind(poi.map_id)
        .bind(poi.poi_id)
        .bind(poi.segment_index)
        .bind(poi.distance_from_origin_km)
        .bind(poi.distance_from_road_meters)
        .bind(side_to_str(poi.side))
        .bind(poi.junction_lat)
        .bind(poi.junction_lon)
        .bind(poi.junction_distance_km)
        .bind(poi.requires_detour)
        .bind(poi.quality_score)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn fetch_map_pois(pool: &PgPool, map_id: Uuid) -> Result<Vec<MapPoi>, sqlx::Error> {
    let rows: Vec<MapPoiRow> = sqlx::query_as(
        r#"
        SELECT map_id, poi_id, segment_index, distance_from_origin_km, distance_from_road_meters,
               side, junction_lat, junction_lon, junction_distance_km, requires_detour, quality_score
        FROM map_pois WHERE map_id = $1 ORDER BY distance_from_origin_km
        "#,
    )
    .bind(map_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn delete_map_pois(pool: &PgPool, map_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM map_pois WHERE map_id = $1").bind(map_id).execute(pool).await?;
    Ok(())
}
