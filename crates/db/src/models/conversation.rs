use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Reserved key inside `session_metadata` mapping 0-based slot index
/// (stringified) to the base URL of the node last bound to that slot.
pub const NODE_SLOTS_KEY: &str = "node_slots";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub title: Option<String>,
    pub session_metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub async fn find_by_id(
        pool: &PgPool,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            "SELECT conversation_id, title, session_metadata, created_at, updated_at
             FROM conversations WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        conversation_id: Uuid,
        title: &str,
    ) -> Result<Conversation, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (conversation_id, title, session_metadata)
             VALUES ($1, $2, '{}'::jsonb)
             RETURNING conversation_id, title, session_metadata, created_at, updated_at",
        )
        .bind(conversation_id)
        .bind(title)
        .fetch_one(pool)
        .await
    }

    /// Finds the conversation by id, or creates a new one titled from the
    /// first 20 code points of `prompt` (§4.1 step 2).
    pub async fn find_or_create(
        pool: &PgPool,
        conversation_id: Option<Uuid>,
        prompt: &str,
    ) -> Result<Conversation, sqlx::Error> {
        if let Some(id) = conversation_id
            && let Some(existing) = Self::find_by_id(pool, id).await?
        {
            return Ok(existing);
        }

        let id = conversation_id.unwrap_or_else(Uuid::new_v4);
        let title = utils::ids::truncate_title(prompt, 20);
        Self::create(pool, id, &title).await
    }

    /// Refreshes `updated_at`, called whenever a child task finishes
    /// successfully (§3 Conversation lifecycle).
    pub async fn touch(pool: &PgPool, conversation_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE conversations SET updated_at = now() WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Reads `session_metadata.node_slots[slot_id]`, if present.
    pub fn node_slot(&self, slot_id: usize) -> Option<String> {
        self.session_metadata
            .get(NODE_SLOTS_KEY)?
            .get(slot_id.to_string())?
            .as_str()
            .map(str::to_owned)
    }

    /// Merges `node_slots[slot_id] = node_url` into `session_metadata` and
    /// persists it. Last-write-wins (§5 Shared-resource policy) — no
    /// optimistic locking, the final committed write stands.
    ///
    /// `jsonb_set` alone is a no-op when the `node_slots` container itself
    /// is absent (fresh conversations start from `'{}'`), so the container
    /// is rebuilt from its current value (or `{}`) before the slot is set,
    /// then merged back in with `||`.
    pub async fn bind_node_slot(
        pool: &PgPool,
        conversation_id: Uuid,
        slot_id: usize,
        node_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE conversations
             SET session_metadata = coalesce(session_metadata, '{}'::jsonb) || jsonb_build_object(
                 $2::text,
                 coalesce(session_metadata->$2, '{}'::jsonb) || jsonb_build_object($3::text, $4::text)
             )
             WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .bind(NODE_SLOTS_KEY)
        .bind(slot_id.to_string())
        .bind(node_url)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Conversation>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            "SELECT conversation_id, title, session_metadata, created_at, updated_at
             FROM conversations ORDER BY updated_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_slot_reads_nested_key() {
        let conv = Conversation {
            conversation_id: Uuid::new_v4(),
            title: None,
            session_metadata: json!({ "node_slots": { "0": "http://node-a:8001" } }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(conv.node_slot(0).as_deref(), Some("http://node-a:8001"));
        assert_eq!(conv.node_slot(1), None);
    }
}
