use db::models::task::Task;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

/// §4.5: reconstructs up to `limit` prior successful `(prompt, response)`
/// pairs as alternating user/assistant turns, ending with `current_prompt`.
/// Only called when the router reports node drift (§4.4's `changed` flag) —
/// otherwise the backend's own sticky state covers history and the worker
/// sends a single-turn message list.
pub async fn build_context(
    pool: &PgPool,
    conversation_id: Option<Uuid>,
    current_prompt: &str,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    let Some(conversation_id) = conversation_id else {
        return Ok(vec![Message {
            role: "user",
            content: current_prompt.to_string(),
        }]);
    };

    let mut recent = Task::recent_success(pool, conversation_id, limit).await?;
    recent.reverse();

    let mut messages = Vec::with_capacity(recent.len() * 2 + 1);
    for task in &recent {
        messages.push(Message {
            role: "user",
            content: task.prompt.clone(),
        });
        messages.push(Message {
            role: "assistant",
            content: task.response_text.clone().unwrap_or_default(),
        });
    }
    messages.push(Message {
        role: "user",
        content: current_prompt.to_string(),
    });

    Ok(messages)
}

/// The single-turn shape used when there is no node drift.
pub fn single_turn(current_prompt: &str) -> Vec<Message> {
    vec![Message {
        role: "user",
        content: current_prompt.to_string(),
    }]
}
