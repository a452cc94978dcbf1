//! Raw SQL for the `cache_entries` table (spec §6).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
pub struct CacheRow {
    pub key: String,
    pub data: Value,
    pub params: Value,
}

pub async fn fetch_exact(pool: &PgPool, key: &str) -> Result<Option<CacheRow>, sqlx::Error> {
    sqlx::query_as::<_, CacheRow>(
        r#"
        SELECT key, data, params
        FROM cache_entries
        WHERE key = $1 AND expires_at > NOW()
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_live_rows_for_operation(
    pool: &PgPool,
    operation: &str,
) -> Result<Vec<CacheRow>, sqlx::Error> {
    sqlx::query_as::<_, CacheRow>(
        r#"
        SELECT key, data, params
        FROM cache_entries
        WHERE operation = $1 AND expires_at > NOW()
        "#,
    )
    .bind(operation)
    .fetch_all(pool)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    pool: &PgPool,
    key: &str,
    data: &Value,
    provider: &str,
    operation: &str,
    expires_at: DateTime<Utc>,
    params: &Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cache_entries (key, data, provider, operation, created_at, expires_at, hit_count, params)
        VALUES ($1, $2, $3, $4, NOW(), $5, 0, $6)
        ON CONFLICT (key) DO UPDATE SET
            data = EXCLUDED.data,
            expires_at = EXCLUDED.expires_at,
            hit_count = 0
        "#,
    )
    .bind(key)
    .bind(data)
    .bind(provider)
    .bind(operation)
    .bind(expires_at)
    .bind(params)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn record_hit(pool: &PgPool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE cache_entries SET hit_count = hit_count + 1 WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at < NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_live(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE expires_at > NOW()")
        .fetch_one(pool)
        .await
}

pub async fn clear(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cache_entries").execute(pool).await?;
    Ok(())
}

/// Deletes rows whose key matches a `provider:operation:*`-style glob,
/// implemented as a SQL `LIKE` prefix match on the portion before the `*`
/// (spec §4.2 / SPEC_FULL §B.4).
pub async fn delete_by_pattern(pool: &PgPool, pattern: &str) -> Result<u64, sqlx::Error> {
    let prefix = pattern.trim_end_matches('*');
    let like_pattern = format!("{prefix}%");
    let result = sqlx::query("DELETE FROM cache_entries WHERE key LIKE $1")
        .bind(like_pattern)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
