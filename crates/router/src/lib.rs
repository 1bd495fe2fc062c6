use db::models::conversation::Conversation;
use db::models::service_node::ServiceNode;
use rand::seq::SliceRandom;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct RouteResult {
    /// Full chat-completions URL, ready to POST to (§4.3 step 6).
    pub url: String,
    pub node_url: String,
    /// True iff the selected node differs from the one previously bound to
    /// this conversation slot — drives context rebuild (§4.5).
    pub changed: bool,
}

/// §4.4: picks a node for `(conversation, slot_id)` within `family_id`.
/// `None` means no capacity — the caller marks the task as such.
pub async fn route(
    pool: &PgPool,
    conversation: &Conversation,
    slot_id: usize,
    family_id: &str,
) -> Result<Option<RouteResult>, RouterError> {
    let healthy = ServiceNode::routable_candidates(pool, family_id).await?;
    if healthy.is_empty() {
        return Ok(None);
    }

    let previous = conversation.node_slot(slot_id);
    let sticky = previous
        .clone()
        .filter(|u| healthy.iter().any(|n| &n.node_url == u));

    let node_url = match sticky {
        Some(url) => url,
        None => {
            let mut rng = rand::thread_rng();
            let picked = healthy.choose(&mut rng).expect("healthy is non-empty").node_url.clone();
            Conversation::bind_node_slot(pool, conversation.conversation_id, slot_id, &picked).await?;
            picked
        }
    };

    let changed = previous.as_deref() != Some(node_url.as_str());

    Ok(Some(RouteResult {
        url: format!("{node_url}/v1/chat/completions"),
        node_url,
        changed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn conv_with_slots(metadata: serde_json::Value) -> Conversation {
        Conversation {
            conversation_id: Uuid::new_v4(),
            title: None,
            session_metadata: metadata,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sticky_slot_is_read_through_node_slot() {
        let conv = conv_with_slots(json!({ "node_slots": { "2": "http://node-c" } }));
        assert_eq!(conv.node_slot(2).as_deref(), Some("http://node-c"));
        assert_eq!(conv.node_slot(0), None);
    }
}
