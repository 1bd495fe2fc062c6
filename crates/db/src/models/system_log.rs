use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Supplemented from `original_source/shared/models.py::SystemLog` (see
/// SPEC_FULL.md): records the detail behind an `InternalError` so it can be
/// grepped without re-running the worker under a debugger.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SystemLog {
    pub id: i64,
    pub level: String,
    pub source: String,
    pub task_id: Option<Uuid>,
    pub message: String,
    pub stack_trace: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SystemLog {
    pub async fn record(
        pool: &PgPool,
        level: &str,
        source: &str,
        task_id: Option<Uuid>,
        message: &str,
        stack_trace: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sys_logs (level, source, task_id, message, stack_trace)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(level)
        .bind(source)
        .bind(task_id)
        .bind(message)
        .bind(stack_trace)
        .execute(pool)
        .await?;
        Ok(())
    }
}
