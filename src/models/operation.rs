//! Durable progress/status records for long-running pipeline work (spec §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationStatus::InProgress => "in_progress",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncOperation {
    pub id: Uuid,
    pub operation_type: String,
    pub status: OperationStatus,
    pub progress_percent: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub user_id: Option<Uuid>,
}

impl AsyncOperation {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, OperationStatus::InProgress)
    }
}
