use deadpool_redis::{Config, Pool, Runtime};
use redis::{
    AsyncCommands,
    streams::{StreamId, StreamReadOptions, StreamReadReply},
};
use thiserror::Error;

use crate::envelope::TaskEnvelope;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
    #[error("redis command error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One delivered stream entry, still carrying its raw `payload` bytes —
/// decoding happens in the worker so parse failures can be routed to the
/// DLQ without the broker crate needing to know about tasks.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: String,
    pub payload: Option<Vec<u8>>,
}

impl Delivery {
    pub fn decode(&self) -> Result<TaskEnvelope, BrokerError> {
        let bytes = self.payload.as_deref().ok_or_else(|| {
            BrokerError::Decode(serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "empty payload",
            )))
        })?;
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The millisecond timestamp embedded in the broker-assigned id
    /// (`"<millis>-<seq>"`), used by recovery (§4.8) to age out stale
    /// pending entries.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.id.split('-').next()?.parse().ok()
    }
}

fn from_reply(reply: StreamReadReply) -> Vec<Delivery> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(delivery_from_stream_id)
        .collect()
}

fn delivery_from_stream_id(entry: StreamId) -> Delivery {
    let payload = entry
        .map
        .get("payload")
        .and_then(|v| match v {
            redis::Value::BulkString(bytes) => Some(bytes.clone()),
            redis::Value::SimpleString(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        });
    Delivery {
        id: entry.id,
        payload,
    }
}

/// Thin wrapper around a Redis connection pool speaking the stream protocol
/// from §6.2: one consumer group per provider family, explicit ack, a
/// pending-entries list for recovery, and a capped dead-letter stream.
#[derive(Clone)]
pub struct StreamClient {
    pool: Pool,
}

impl StreamClient {
    pub fn new(redis_url: &str) -> Result<StreamClient, BrokerError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(StreamClient { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Idempotent consumer-group creation: `BUSYGROUP` (group already
    /// exists) is swallowed, every other error propagates.
    pub async fn ensure_group(&self, stream_key: &str, group: &str) -> Result<(), BrokerError> {
        let mut conn = self.pool.get().await?;
        let result: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(stream_key, group, "$")
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// §4.1 step 4 / §6.2: append one entry whose sole field is `payload`.
    pub async fn enqueue(
        &self,
        stream_key: &str,
        envelope: &TaskEnvelope,
        maxlen: Option<usize>,
    ) -> Result<String, BrokerError> {
        let mut conn = self.pool.get().await?;
        let payload = serde_json::to_string(envelope)?;
        let id: String = match maxlen {
            Some(cap) => {
                conn.xadd_maxlen(
                    stream_key,
                    redis::streams::StreamMaxlen::Approx(cap),
                    "*",
                    &[("payload", payload)],
                )
                .await?
            }
            None => conn.xadd(stream_key, "*", &[("payload", payload)]).await?,
        };
        Ok(id)
    }

    /// Steady-state read: blocks up to `block_ms` for new entries (`>`) on
    /// `stream_key` for `consumer` in `group` (§5 Suspension points).
    pub async fn read_new(
        &self,
        stream_key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut conn = self.pool.get().await?;
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms);
        let reply: StreamReadReply = conn.xread_options(&[stream_key], &[">"], &opts).await?;
        Ok(from_reply(reply))
    }

    /// §4.8: the consumer's pending-entries list, read from the start (id
    /// `0`), non-blocking.
    pub async fn read_pending(
        &self,
        stream_key: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut conn = self.pool.get().await?;
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count);
        let reply: StreamReadReply = conn.xread_options(&[stream_key], &["0"], &opts).await?;
        Ok(from_reply(reply))
    }

    pub async fn ack(&self, stream_key: &str, group: &str, id: &str) -> Result<(), BrokerError> {
        let mut conn = self.pool.get().await?;
        let _: i64 = conn.xack(stream_key, group, &[id]).await?;
        Ok(())
    }

    /// Backs `GET /health`'s `broker` field (§6.1).
    pub async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
