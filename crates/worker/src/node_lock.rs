use std::time::Duration;

use chrono::Utc;
use db::models::conversation::Conversation;
use db::models::service_node::{NodeStatus, ServiceNode};
use rand::Rng;
use sqlx::PgPool;

const MAX_ATTEMPTS: u32 = 3;
const JITTER_MIN_MS: u64 = 50;
const JITTER_MAX_MS: u64 = 150;

#[derive(Debug, Clone)]
pub struct AcquiredNode {
    pub node_url: String,
    /// Node drift relative to the conversation's previous sticky binding —
    /// feeds the §4.5 context-rebuild decision.
    pub changed: bool,
}

fn is_alive(node: &ServiceNode) -> bool {
    node.status == NodeStatus::Healthy && node.last_heartbeat > Utc::now() - chrono::Duration::seconds(30)
}

async fn jitter_sleep() {
    let ms = rand::thread_rng().gen_range(JITTER_MIN_MS..=JITTER_MAX_MS);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// §4.3 step 3: up to three attempts to find and exclusively claim a node.
/// A router miss (no healthy family members at all) short-circuits
/// immediately — retrying wouldn't change the candidate set mid-message.
/// A lost CAS race against another worker is retried with jitter.
pub async fn acquire_node(
    pool: &PgPool,
    conversation: &Conversation,
    slot_id: usize,
    family_id: &str,
    pre_bound: Option<&str>,
) -> Result<Option<AcquiredNode>, sqlx::Error> {
    for attempt in 0..MAX_ATTEMPTS {
        let Some(route) = router::route(pool, conversation, slot_id, family_id).await.map_err(|e| match e {
            router::RouterError::Db(e) => e,
        })? else {
            return Ok(None);
        };

        let mut final_node = route.node_url.clone();
        if let Some(pre) = pre_bound
            && pre != final_node
            && let Some(candidate) = ServiceNode::find_by_url(pool, pre).await?
            && is_alive(&candidate)
        {
            final_node = pre.to_string();
        }

        if ServiceNode::cas_claim(pool, &final_node).await? {
            let previous = conversation.node_slot(slot_id);
            let changed = previous.as_deref() != Some(final_node.as_str());
            return Ok(Some(AcquiredNode {
                node_url: final_node,
                changed,
            }));
        }

        tracing::debug!(attempt, node_url = %final_node, "lost CAS race on node claim, retrying");
        if attempt + 1 < MAX_ATTEMPTS {
            jitter_sleep().await;
        }
    }

    Ok(None)
}
