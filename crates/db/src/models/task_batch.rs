use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    Processing,
    Completed,
    PartialFailure,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatBatch {
    pub batch_id: Uuid,
    pub conversation_id: Uuid,
    pub user_prompt: String,
    pub model_config: String,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

impl ChatBatch {
    pub async fn create(
        pool: &PgPool,
        batch_id: Uuid,
        conversation_id: Uuid,
        user_prompt: &str,
        model_config: &str,
    ) -> Result<ChatBatch, sqlx::Error> {
        sqlx::query_as::<_, ChatBatch>(
            "INSERT INTO chat_batches (batch_id, conversation_id, user_prompt, model_config, status)
             VALUES ($1, $2, $3, $4, 'PROCESSING')
             RETURNING batch_id, conversation_id, user_prompt, model_config, status, created_at",
        )
        .bind(batch_id)
        .bind(conversation_id)
        .bind(user_prompt)
        .bind(model_config)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, batch_id: Uuid) -> Result<Option<ChatBatch>, sqlx::Error> {
        sqlx::query_as::<_, ChatBatch>(
            "SELECT batch_id, conversation_id, user_prompt, model_config, status, created_at
             FROM chat_batches WHERE batch_id = $1",
        )
        .bind(batch_id)
        .fetch_optional(pool)
        .await
    }

    /// §9 Open Question (b): recompute aggregate status from the children's
    /// terminal states. COMPLETED when every task is SUCCESS, PARTIAL_FAILURE
    /// when at least one is FAILED and the rest are terminal, otherwise left
    /// untouched (still has PENDING/PROCESSING children).
    pub async fn recompute_status(pool: &PgPool, batch_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE chat_batches SET status = CASE
                 WHEN NOT EXISTS (
                     SELECT 1 FROM tasks WHERE batch_id = $1 AND status IN (0, 3)
                 ) THEN (
                     CASE WHEN EXISTS (
                         SELECT 1 FROM tasks WHERE batch_id = $1 AND status = 2
                     ) THEN 'PARTIAL_FAILURE' ELSE 'COMPLETED' END
                 )
                 ELSE status
             END
             WHERE batch_id = $1",
        )
        .bind(batch_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
