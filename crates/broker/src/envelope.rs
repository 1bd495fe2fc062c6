use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire shape of the single `payload` field carried by every stream entry
/// (§6.2). This is the only thing the dispatcher writes and the only thing
/// a worker reads back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_id: Uuid,
    pub conversation_id: Uuid,
    pub prompt: String,
    pub model: String,
    #[serde(default)]
    pub file_paths: Vec<String>,
    pub target_node_url: Option<String>,
    /// Index into the conversation's sticky-session slot map (§3
    /// `node_slots`) — the dispatcher assigns one per fan-out replica.
    pub slot_id: usize,
}
