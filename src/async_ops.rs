//! Thin orchestration wrapper around [`crate::db::operations`]; gives
//! callers a `chrono`-free API and a single place to reason about the
//! idempotent terminal transitions the SQL layer already enforces (spec §4.8).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::models::AsyncOperation;

pub const STALE_THRESHOLD_HOURS: i64 = 2;
pub const RETENTION_HOURS: i64 = 24;

pub async fn create(
    pool: &PgPool,
    operation_type: &str,
    user_id: Option<Uuid>,
    estimated_completion: Option<DateTime<Utc>>,
) -> Result<AsyncOperation, PersistenceError> {
    Ok(crate::db::operations::create(pool, operation_type, user_id, estimated_completion, None).await?)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<AsyncOperation, PersistenceError> {
    crate::db::operations::fetch(pool, id)
        .await?
        .ok_or_else(|| PersistenceError::NotFound(format!("async_operation {id}")))
}

/// No-ops once the operation has already reached a terminal state.
pub async fn update_progress(
    pool: &PgPool,
    id: Uuid,
    percent: f64,
    estimated_completion: Option<DateTime<Utc>>,
) -> Result<(), PersistenceError> {
    Ok(crate::db::operations::update_progress(pool, id, percent.clamp(0.0, 100.0), estimated_completion).await?)
}

/// Idempotent: a second call after the operation is already terminal is a no-op.
pub async fn complete(pool: &PgPool, id: Uuid, result: Value) -> Result<(), PersistenceError> {
    Ok(crate::db::operations::complete(pool, id, result).await?)
}

pub async fn fail(pool: &PgPool, id: Uuid, error: &str) -> Result<(), PersistenceError> {
    Ok(crate::db::operations::fail(pool, id, error).await?)
}

pub async fn list(
    pool: &PgPool,
    active_only: bool,
    operation_type: Option<&str>,
    limit: i64,
) -> Result<Vec<AsyncOperation>, PersistenceError> {
    Ok(crate::db::operations::list(pool, active_only, operation_type, limit).await?)
}

pub async fn stats(
    pool: &PgPool,
    operation_type: Option<&str>,
) -> Result<crate::db::operations::OperationCounts, PersistenceError> {
    Ok(crate::db::operations::stats(pool, operation_type).await?)
}

pub async fn cleanup_old(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, PersistenceError> {
    let cutoff = now - chrono::Duration::hours(RETENTION_HOURS);
    Ok(crate::db::operations::cleanup_old(pool, cutoff).await?)
}

pub async fn cleanup_stale(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, PersistenceError> {
    let cutoff = now - chrono::Duration::hours(STALE_THRESHOLD_HOURS);
    Ok(crate::db::operations::cleanup_stale(pool, cutoff).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_threshold_is_two_hours_and_retention_is_a_day() {
        assert_eq!(STALE_THRESHOLD_HOURS, 2);
        assert_eq!(RETENTION_HOURS, 24);
    }
}
