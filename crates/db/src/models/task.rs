use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Mirrors §3's explicit numeric encoding — workers and the stream payload
/// both reason about these codes, so they're pinned rather than left to
/// derive-macro discretion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum TaskStatus {
    Pending = 0,
    Success = 1,
    Failed = 2,
    Processing = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    Text,
    Multimodal,
    Image,
}

impl TaskType {
    pub fn classify(mode_is_image: bool, has_files: bool) -> TaskType {
        if mode_is_image {
            TaskType::Image
        } else if has_files {
            TaskType::Multimodal
        } else {
            TaskType::Text
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub batch_id: Uuid,
    pub conversation_id: Uuid,
    pub prompt: String,
    pub model_name: String,
    pub task_type: TaskType,
    /// Ordered local upload paths, as JSON text array.
    pub file_paths: Value,
    pub status: TaskStatus,
    pub response_text: Option<String>,
    pub error_msg: Option<String>,
    pub cost_time: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn file_paths_vec(&self) -> Vec<String> {
        self.file_paths
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        task_id: Uuid,
        batch_id: Uuid,
        conversation_id: Uuid,
        prompt: &str,
        model_name: &str,
        task_type: TaskType,
        file_paths: &[String],
    ) -> Result<Task, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "INSERT INTO tasks
                 (task_id, batch_id, conversation_id, prompt, model_name, task_type, file_paths, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
             RETURNING task_id, batch_id, conversation_id, prompt, model_name, task_type,
                       file_paths, status, response_text, error_msg, cost_time, created_at, updated_at",
        )
        .bind(task_id)
        .bind(batch_id)
        .bind(conversation_id)
        .bind(prompt)
        .bind(model_name)
        .bind(task_type)
        .bind(serde_json::to_value(file_paths).unwrap_or_default())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, task_id: Uuid) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT task_id, batch_id, conversation_id, prompt, model_name, task_type,
                    file_paths, status, response_text, error_msg, cost_time, created_at, updated_at
             FROM tasks WHERE task_id = $1",
        )
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_batch_id(
        pool: &PgPool,
        batch_id: Uuid,
    ) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT task_id, batch_id, conversation_id, prompt, model_name, task_type,
                    file_paths, status, response_text, error_msg, cost_time, created_at, updated_at
             FROM tasks WHERE batch_id = $1 ORDER BY created_at ASC",
        )
        .bind(batch_id)
        .fetch_all(pool)
        .await
    }

    /// §4.3 step 2 / §4.8: idempotent claim. Returns `true` iff this caller
    /// won the race (exactly one row affected).
    pub async fn claim(pool: &PgPool, task_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status = 3, updated_at = now() WHERE task_id = $1 AND status = 0",
        )
        .bind(task_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// §4.8 zombie reset: downgrade a task still `PROCESSING` after a crash
    /// back to `PENDING` so a subsequent `claim` can succeed.
    pub async fn reset_zombie_to_pending(pool: &PgPool, task_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status = 0, updated_at = now() WHERE task_id = $1 AND status = 3",
        )
        .bind(task_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_failed(
        pool: &PgPool,
        task_id: Uuid,
        error_msg: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET status = 2, error_msg = $2, updated_at = now() WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(error_msg)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn finish_success(
        pool: &PgPool,
        task_id: Uuid,
        response_text: &str,
        cost_time: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET status = 1, response_text = $2, cost_time = $3, updated_at = now()
             WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(response_text)
        .bind(cost_time)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// §4.5 Context Loader: the last `limit` successful tasks for this
    /// conversation, newest first — callers reverse to ascending order.
    pub async fn recent_success(
        pool: &PgPool,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT task_id, batch_id, conversation_id, prompt, model_name, task_type,
                    file_paths, status, response_text, error_msg, cost_time, created_at, updated_at
             FROM tasks
             WHERE conversation_id = $1 AND status = 1 AND response_text IS NOT NULL
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// §6.1 `/v1/conversations/{id}/history`: every task ever submitted for
    /// this conversation, oldest first, for the gateway to render (failed
    /// tasks excluded, in-flight tasks shown as a loading placeholder — both
    /// are rendering decisions, not query-level filters).
    pub async fn find_by_conversation_id(
        pool: &PgPool,
        conversation_id: Uuid,
    ) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT task_id, batch_id, conversation_id, prompt, model_name, task_type,
                    file_paths, status, response_text, error_msg, cost_time, created_at, updated_at
             FROM tasks WHERE conversation_id = $1 ORDER BY created_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_image_over_multimodal() {
        assert_eq!(TaskType::classify(true, true), TaskType::Image);
    }

    #[test]
    fn classifies_multimodal_when_files_present() {
        assert_eq!(TaskType::classify(false, true), TaskType::Multimodal);
    }

    #[test]
    fn classifies_text_by_default() {
        assert_eq!(TaskType::classify(false, false), TaskType::Text);
    }

    #[test]
    fn file_paths_vec_round_trips_through_json() {
        let task = Task {
            task_id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            prompt: "hi".into(),
            model_name: "gemini".into(),
            task_type: TaskType::Text,
            file_paths: serde_json::json!(["a.png", "b.png"]),
            status: TaskStatus::Pending,
            response_text: None,
            error_msg: None,
            cost_time: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(task.file_paths_vec(), vec!["a.png", "b.png"]);
    }
}
