//! Raw SQL for the `pois` and `segment_pois` tables (spec §3/§4.5/§4.7).

use std::collections::BTreeSet;

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Poi, PoiCategory, QualityIssue, SegmentPoi};

#[derive(Debug, sqlx::FromRow)]
struct PoiRow {
    id: Uuid,
    osm_id: Option<String>,
    here_id: Option<String>,
    google_place_id: Option<String>,
    name: Option<String>,
    category: String,
    latitude: f64,
    longitude: f64,
    city: Option<String>,
    operator: Option<String>,
    brand: Option<String>,
    opening_hours: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    cuisine: Option<String>,
    amenities: Value,
    tags: Value,
    quality_score: f64,
    quality_issues: Value,
    is_low_quality: bool,
    is_disabled: bool,
    is_referenced: bool,
    enriched_by: Value,
}

fn category_to_str(category: PoiCategory) -> String {
    category.to_string()
}

fn category_from_str(s: &str) -> PoiCategory {
    serde_json::from_value(Value::String(s.to_string())).unwrap_or(PoiCategory::Other)
}

impl From<PoiRow> for Poi {
    fn from(row: PoiRow) -> Self {
        Poi {
            id: row.id,
            osm_id: row.osm_id,
            here_id: row.here_id,
            google_place_id: row.google_place_id,
            name: row.name,
            category: category_from_str(&row.category),
            latitude: row.latitude,
            longitude: row.longitude,
            city: row.city,
            operator: row.operator,
            brand: row.brand,
            opening_hours: row.opening_hours,
            phone: row.phone,
            website: row.website,
            cuisine: row.cuisine,
            amenities: serde_json::from_value::<BTreeSet<String>>(row.amenities).unwrap_or_default(),
            tags: row.tags,
            quality_score: row.quality_score,
            quality_issues: serde_json::from_value::<Vec<QualityIssue>>(row.quality_issues).unwrap_or_default(),
            is_low_quality: row.is_low_quality,
            is_disabled: row.is_disabled,
            is_referenced: row.is_referenced,
            enriched_by: serde_json::from_value::<BTreeSet<String>>(row.enriched_by).unwrap_or_default(),
        }
    }
}

const POI_COLUMNS: &str = r#"
    id, osm_id, here_id, google_place_id, name, category, latitude, longitude,
    city, operator, brand, opening_hours, phone, website, cuisine, amenities,
    tags, quality_score, quality_issues, is_low_quality, is_disabled,
    is_referenced, enriched_by
"#;

pub async fn find_by_provider_id(
    pool: &PgPool,
    provider: &str,
    provider_id: &str,
) -> Result<Option<Poi>, sqlx::Error> {
    let column = match provider {
        "here" => "here_id",
        "google" => "google_place_id",
        _ => "osm_id",
    };
    let query = format!("SELECT {POI_COLUMNS} FROM pois WHERE {column} = $1");
    let row: Option<PoiRow> = sqlx::query_as(&query).bind(provider_id).fetch_optional(pool).await?;
    Ok(row.map(Into::into))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Poi>, sqlx::Error> {
    let query = format!("SELECT {POI_COLUMNS} FROM pois WHERE id = $1");
    let row: Option<PoiRow> = sqlx::query_as(&query).bind(id).fetch_optional(pool).await?;
    Ok(row.map(Into::into))
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(pool: &PgPool, poi: &Poi) -> Result<Poi, sqlx::Error> {
    let query = format!(
        "INSERT INTO pois ({POI_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23) RETURNING {POI_COLUMNS}"
    );
    let row: PoiRow = sqlx::query_as(&query)
        .bind(poi.id)
        .bind(&poi.osm_id)
        .bind(&poi.here_id)
        .bind(&poi.google_place_id)
        .bind(&poi.name)
        .bind(category_to_str(poi.category))
        .bind(poi.latitude)
        .bind(poi.longitude)
        .bind(&poi.city)
        .bind(&poi.operator)
        .bind(&poi.brand)
        .bind(&poi.opening_hours)
        .bind(&poi.phone)
        .bind(&poi.website)
        .bind(&poi.cuisine)
        .bind(serde_json::to_value(&poi.amenities).unwrap_or(Value::Array(vec![])))
        .bind(&poi.tags)
        .bind(poi.quality_score)
        .bind(serde_json::to_value(&poi.quality_issues).unwrap_or(Value::Array(vec![])))
        .bind(poi.is_low_quality)
        .bind(poi.is_disabled)
        .bind(poi.is_referenced)
        .bind(serde_json::to_value(&poi.enriched_by).unwrap_or(Value::Array(vec![])))
        .fetch_one(pool)
        .await?;
    Ok(row.into())
}

/// Update-in-place on provider data drift (Open Question 1, SPEC_FULL §C.1):
/// refreshes location/name/contact fields and recomputed quality, but never
/// touches `id` or `is_referenced`.
pub async fn update_observed_fields(pool: &PgPool, poi: &Poi) -> Result<Poi, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE pois SET
            name = $2, latitude = $3, longitude = $4, city = $5, operator = $6,
            brand = $7, opening_hours = $8, phone = $9, website = $10, cuisine = $11,
            amenities = $12, tags = $13, quality_score = $14, quality_issues = $15,
            is_low_quality = $16
        WHERE id = $1
        RETURNING {POI_COLUMNS}
        "#
    );
    let row: PoiRow = sqlx::query_as(&query)
        .bind(poi.id)
        .bind(&poi.name)
        .bind(poi.latitude)
        .bind(poi.longitude)
        .bind(&poi.city)
        .bind(&poi.operator)
        .bind(&poi.brand)
        .bind(&poi.opening_hours)
        .bind(&poi.phone)
        .bind(&poi.website)
        .bind(&poi.cuisine)
        .bind(serde_json::to_value(&poi.amenities).unwrap_or(Value::Array(vec![])))
        .bind(&poi.tags)
        .bind(poi.quality_score)
        .bind(serde_json::to_value(&poi.quality_issues).unwrap_or(Value::Array(vec![])))
        .bind(poi.is_low_quality)
        .fetch_one(pool)
        .await?;
    Ok(row.into())
}

pub async fn add_enrichment_source(pool: &PgPool, id: Uuid, source: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE pois SET enriched_by = (
            SELECT to_jsonb(array_agg(DISTINCT elem))
            FROM (SELECT jsonb_array_elements_text(enriched_by) AS elem
                  UNION SELECT $2) AS merged(elem)
        )
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(source)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_referenced(pool: &PgPool, id: Uuid, is_referenced: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE pois SET is_referenced = $2 WHERE id = $1")
        .bind(id)
        .bind(is_referenced)
        .execute(pool)
        .await?;
    Ok(())
}

/// Repairs `is_referenced` for every POI in one pass (spec §4.9).
pub async fn repair_is_referenced(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE pois SET is_referenced = EXISTS (
            SELECT 1 FROM map_pois mp WHERE mp.poi_id = pois.id
        )
        WHERE is_referenced != EXISTS (
            SELECT 1 FROM map_pois mp WHERE mp.poi_id = pois.id
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn find_orphans(pool: &PgPool) -> Result<Vec<Poi>, sqlx::Error> {
    let query = format!(
        "SELECT {POI_COLUMNS} FROM pois WHERE NOT EXISTS (SELECT 1 FROM map_pois mp WHERE mp.poi_id = pois.id)"
    );
    let rows: Vec<PoiRow> = sqlx::query_as(&query).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM pois WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub async fn insert_segment_poi(pool: &PgPool, link: &SegmentPoi) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO segment_pois (segment_id, poi_id, search_point_index, straight_line_distance_m)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (segment_id, poi_id) DO UPDATE SET
            search_point_index = EXCLUDED.search_point_index,
            straight_line_distance_m = EXCLUDED.straight_line_distance_m
        "#,
    )
    .bind(link.segment_id)
    .bind(link.poi_id)
    .bind(link.search_point_index)
    .bind(link.straight_line_distance_m)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct SegmentPoiRow {
    segment_id: Uuid,
    poi_id: Uuid,
    search_point_index: i32,
    straight_line_distance_m: i32,
}

impl From<SegmentPoiRow> for SegmentPoi {
    fn from(row: SegmentPoiRow) -> Self {
        SegmentPoi {
            segment_id: row.segment_id,
            poi_id: row.poi_id,
            search_point_index: row.search_point_index,
            straight_line_distance_m: row.straight_line_distance_m,
        }
    }
}

/// Loads `(SegmentPoi, Poi)` pairs for a segment, eager on POI data
/// (spec §4.7 — MapAssembly step 3 "load SegmentPOIs with eager POI data").
pub async fn fetch_for_segment(pool: &PgPool, segment_id: Uuid) -> Result<Vec<(SegmentPoi, Poi)>, sqlx::Error> {
    #[derive(Debug, sqlx::FromRow)]
    struct JoinedRow {
        segment_id: Uuid,
        poi_id: Uuid,
        search_point_index: i32,
        straight_line_distance_m: i32,
        poi_id2: Uuid,
        osm_id: Option<String>,
        here_id: Option<String>,
        google_place_id: Option<String>,
        name: Option<String>,
        category: String,
        latitude: f64,
        longitude: f64,
        city: Option<String>,
        operator: Option<String>,
        brand: Option<String>,
        opening_hours: Option<String>,
        phone: Option<String>,
        website: Option<String>,
        cuisine: Option<String>,
        amenities: Value,
        tags: Value,
        quality_score: f64,
        quality_issues: Value,
        is_low_quality: bool,
        is_disabled: bool,
        is_referenced: bool,
        enriched_by: Value,
    }

    let rows: Vec<JoinedRow> = sqlx::query_as(
        r#"
        SELECT
            sp.segment_id, sp.poi_id, sp.search_point_index, sp.straight_line_distance_m,
            p.id AS poi_id2, p.osm_id, p.here_id, p.google_place_id, p.name, p.category,
            p.latitude, p.longitude, p.city, p.operator, p.brand, p.opening_hours, p.phone,
            p.website, p.cuisine, p.amenities, p.tags, p.quality_score, p.quality_issues,
            p.is_low_quality, p.is_disabled, p.is_referenced, p.enriched_by
        FROM segment_pois sp
        JOIN pois p ON p.id = sp.poi_id
        WHERE sp.segment_id = $1
        "#,
    )
    .bind(segment_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let segment_poi = SegmentPoi {
                segment_id: r.segment_id,
                poi_id: r.poi_id,
                search_point_index: r.search_point_index,
                straight_line_distance_m: r.straight_line_distance_m,
            };
            let poi = Poi {
                id: r.poi_id2,
                osm_id: r.osm_id,
                here_id: r.here_id,
                google_place_id: r.google_place_id,
                name: r.name,
                category: category_from_str(&r.category),
                latitude: r.latitude,
                longitude: r.longitude,
                city: r.city,
                operator: r.operator,
                brand: r.brand,
                opening_hours: r.opening_hours,
                phone: r.phone,
                website: r.website,
                cuisine: r.cuisine,
                amenities: serde_json::from_value(r.amenities).unwrap_or_default(),
                tags: r.tags,
                quality_score: r.quality_score,
                quality_issues: serde_json::from_value(r.quality_issues).unwrap_or_default(),
                is_low_quality: r.is_low_quality,
                is_disabled: r.is_disabled,
                is_referenced: r.is_referenced,
                enriched_by: serde_json::from_value(r.enriched_by).unwrap_or_default(),
            };
            (segment_poi, poi)
        })
        .collect())
}
