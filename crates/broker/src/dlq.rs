use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stream::{BrokerError, StreamClient};

pub const DLQ_STREAM_KEY: &str = "sys_dead_letters";
pub const DLQ_MAXLEN: usize = 10_000;

/// §4.8: what a worker writes before acking a message it could not recover
/// from. Grounded on `message_io.py::send_to_dlq` — same fields, same
/// trimmed-approximate cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub original_id: String,
    pub task_id: Option<Uuid>,
    pub error: String,
    pub source_worker: String,
    pub failed_at: DateTime<Utc>,
    pub raw_payload: Option<String>,
}

pub async fn send_to_dlq(client: &StreamClient, entry: &DeadLetterEntry) -> Result<String, BrokerError> {
    let mut conn = client.pool().get().await?;
    let body = serde_json::to_string(entry)?;
    let id: String = conn
        .xadd_maxlen(
            DLQ_STREAM_KEY,
            redis::streams::StreamMaxlen::Approx(DLQ_MAXLEN),
            "*",
            &[("payload", body)],
        )
        .await?;
    Ok(id)
}
