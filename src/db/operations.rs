//! Raw SQL for `async_operations` (spec §4.8). Every write is a single
//! statement guarded by a status predicate so concurrent terminators are
//! idempotent and can never regress `completed`/`failed` back to
//! `in_progress` (spec §5).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AsyncOperation, OperationStatus};

#[derive(Debug, sqlx::FromRow)]
struct OperationRow {
    id: Uuid,
    operation_type: String,
    status: String,
    progress_percent: f64,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    estimated_completion: Option<DateTime<Utc>>,
    result: Option<Value>,
    error: Option<String>,
    user_id: Option<Uuid>,
}

fn status_to_str(status: OperationStatus) -> String {
    status.to_string()
}

fn status_from_str(s: &str) -> OperationStatus {
    match s {
        "completed" => OperationStatus::Completed,
        "failed" => OperationStatus::Failed,
        _ => OperationStatus::InProgress,
    }
}

impl From<OperationRow> for AsyncOperation {
    fn from(row: OperationRow) -> Self {
        AsyncOperation {
            id: row.id,
            operation_type: row.operation_type,
            status: status_from_str(&row.status),
            progress_percent: row.progress_percent,
            started_at: row.started_at,
            completed_at: row.completed_at,
            estimated_completion: row.estimated_completion,
            result: row.result,
            error: row.error,
            user_id: row.user_id,
        }
    }
}

const COLUMNS: &str = r#"
    id, operation_type, status, progress_percent, started_at, completed_at,
    estimated_completion, result, error, user_id
"#;

pub async fn create(
    pool: &PgPool,
    operation_type: &str,
    user_id: Option<Uuid>,
    estimated_completion: Option<DateTime<Utc>>,
    initial_result: Option<Value>,
) -> Result<AsyncOperation, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO async_operations
            (id, operation_type, status, progress_percent, started_at, completed_at,
             estimated_completion, result, error, user_id)
        VALUES ($1, $2, 'in_progress', 0, NOW(), NULL, $3, $4, NULL, $5)
        RETURNING {COLUMNS}
        "#
    );
    let row: OperationRow = sqlx::query_as(&query)
        .bind(Uuid::new_v4())
        .bind(operation_type)
        .bind(estimated_completion)
        .bind(initial_result)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(row.into())
}

pub async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<AsyncOperation>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM async_operations WHERE id = $1");
    let row: Option<OperationRow> = sqlx::query_as(&query).bind(id).fetch_optional(pool).await?;
    Ok(row.map(Into::into))
}

/// Only takes effect while `status = 'in_progress'` (spec §4.8).
pub async fn update_progress(
    pool: &PgPool,
    id: Uuid,
    percent: f64,
    estimated_completion: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE async_operations
        SET progress_percent = $2, estimated_completion = COALESCE($3, estimated_completion)
        WHERE id = $1 AND status = 'in_progress'
        "#,
    )
    .bind(id)
    .bind(percent)
    .bind(estimated_completion)
    .execute(pool)
    .await?;
    Ok(())
}

/// Idempotent terminal transition; a no-op once already terminal.
pub async fn complete(pool: &PgPool, id: Uuid, result: Value) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE async_operations
        SET status = 'completed', progress_percent = 100, completed_at = NOW(), result = $2
        WHERE id = $1 AND status = 'in_progress'
        "#,
    )
    .bind(id)
    .bind(result)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail(pool: &PgPool, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE async_operations
        SET status = 'failed', completed_at = NOW(), error = $2
        WHERE id = $1 AND status = 'in_progress'
        "#,
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list(
    pool: &PgPool,
    active_only: bool,
    operation_type: Option<&str>,
    limit: i64,
) -> Result<Vec<AsyncOperation>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {COLUMNS} FROM async_operations
        WHERE (NOT $1 OR status = 'in_progress')
          AND ($2::text IS NULL OR operation_type = $2)
        ORDER BY started_at DESC
        LIMIT $3
        "#
    );
    let rows: Vec<OperationRow> = sqlx::query_as(&query)
        .bind(active_only)
        .bind(operation_type)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub struct OperationCounts {
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
}

pub async fn stats(pool: &PgPool, operation_type: Option<&str>) -> Result<OperationCounts, sqlx::Error> {
    #[derive(sqlx::FromRow)]
    struct Row {
        status: String,
        count: i64,
    }
    let rows: Vec<Row> = sqlx::query_as(
        r#"
        SELECT status, COUNT(*) AS count FROM async_operations
        WHERE $1::text IS NULL OR operation_type = $1
        GROUP BY status
        "#,
    )
    .bind(operation_type)
    .fetch_all(pool)
    .await?;

    let mut counts = OperationCounts { in_progress: 0, completed: 0, failed: 0 };
    for row in rows {
        match row.status.as_str() {
            "in_progress" => counts.in_progress = row.count,
            "completed" => counts.completed = row.count,
            "failed" => counts.failed = row.count,
            _ => {}
        }
    }
    Ok(counts)
}

/// Deletes terminal operations older than `cutoff` (spec §4.8 — `>24h`).
pub async fn cleanup_old(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM async_operations
        WHERE status IN ('completed', 'failed') AND completed_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Forces stuck `in_progress` rows older than `cutoff` to `failed` (spec §3/§4.8 — `>2h`).
pub async fn cleanup_stale(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE async_operations
        SET status = 'failed', completed_at = NOW(), error = 'stale operation: exceeded maximum in_progress duration'
        WHERE status = 'in_progress' AND started_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
