use std::time::Instant;

use broker::{BrokerError, DeadLetterEntry, Delivery, StreamClient, dlq};
use chrono::Utc;
use db::models::conversation::Conversation;
use db::models::service_node::ServiceNode;
use db::models::system_log::SystemLog;
use db::models::task::Task;
use db::models::task_batch::ChatBatch;
use sqlx::PgPool;
use thiserror::Error;

use crate::audit::process_ai_result;
use crate::backend::BackendClient;
use crate::context::{build_context, single_turn};
use crate::node_lock::acquire_node;

const NO_CAPACITY_MSG: &str = "系统繁忙：无可用节点或资源竞争超时";
const UPLOAD_ERROR_PREFIX: &str = "文件上传失败";
const CONTEXT_HISTORY_LIMIT: i64 = 10;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Everything a running worker needs handed to it, mirroring the teacher's
/// deployment-handle pattern rather than ambient globals (§9 Design Notes).
#[derive(Clone)]
pub struct WorkerContext {
    pub pool: PgPool,
    pub stream: StreamClient,
    pub backend: BackendClient,
    /// Identifies this process in DLQ entries and router tracing.
    pub consumer_id: String,
}

/// §4.3: the full per-message lifecycle. `mandatory_claim` forces the
/// idempotent `UPDATE ... WHERE status=PENDING` even though steady-state
/// `">"` reads could skip it (the broker already guarantees single
/// delivery within the group) — recovery always passes `true`.
pub async fn process_message(
    ctx: &WorkerContext,
    stream_key: &str,
    group: &str,
    delivery: Delivery,
    mandatory_claim: bool,
) -> Result<(), RunnerError> {
    let envelope = match delivery.decode() {
        Ok(e) => e,
        Err(e) => {
            let _ = SystemLog::record(
                &ctx.pool,
                "ERROR",
                "worker::decode",
                None,
                &e.to_string(),
                None,
            )
            .await;
            write_to_dlq(ctx, &delivery, &e.to_string()).await?;
            ctx.stream.ack(stream_key, group, &delivery.id).await?;
            return Ok(());
        }
    };

    if mandatory_claim && !Task::claim(&ctx.pool, envelope.task_id).await? {
        ctx.stream.ack(stream_key, group, &delivery.id).await?;
        return Ok(());
    }

    let family = families::resolve(&envelope.model);

    let Some(conversation) = Conversation::find_by_id(&ctx.pool, envelope.conversation_id).await?
    else {
        Task::mark_failed(&ctx.pool, envelope.task_id, "系统内部处理错误").await?;
        let _ = SystemLog::record(
            &ctx.pool,
            "ERROR",
            "worker::runner",
            Some(envelope.task_id),
            "conversation not found for task",
            None,
        )
        .await;
        recompute_batch(&ctx.pool, envelope.task_id).await?;
        ctx.stream.ack(stream_key, group, &delivery.id).await?;
        return Ok(());
    };

    let pre_bound = envelope.target_node_url.as_deref();
    let acquired = acquire_node(
        &ctx.pool,
        &conversation,
        envelope.slot_id,
        family.id.as_str(),
        pre_bound,
    )
    .await?;

    let Some(acquired) = acquired else {
        Task::mark_failed(&ctx.pool, envelope.task_id, NO_CAPACITY_MSG).await?;
        recompute_batch(&ctx.pool, envelope.task_id).await?;
        ctx.stream.ack(stream_key, group, &delivery.id).await?;
        return Ok(());
    };

    ServiceNode::increment_current_tasks(&ctx.pool, &acquired.node_url, 1).await?;

    let remote_files = if envelope.file_paths.is_empty() {
        None
    } else {
        match ctx
            .backend
            .upload_files(&acquired.node_url, &envelope.file_paths)
            .await
        {
            Ok(files) => Some(files),
            Err(e) => {
                Task::mark_failed(
                    &ctx.pool,
                    envelope.task_id,
                    &format!("{UPLOAD_ERROR_PREFIX}: {e}"),
                )
                .await?;
                recompute_batch(&ctx.pool, envelope.task_id).await?;
                release_node(&ctx.pool, &acquired.node_url).await?;
                ctx.stream.ack(stream_key, group, &delivery.id).await?;
                return Ok(());
            }
        }
    };

    let messages = if acquired.changed {
        build_context(
            &ctx.pool,
            Some(envelope.conversation_id),
            &envelope.prompt,
            CONTEXT_HISTORY_LIMIT,
        )
        .await?
    } else {
        single_turn(&envelope.prompt)
    };

    let start = Instant::now();
    let invoke_result = ctx
        .backend
        .chat_completions(
            &acquired.node_url,
            &envelope.model,
            envelope.conversation_id,
            &messages,
            remote_files.as_deref(),
            family.request_timeout,
        )
        .await;
    let cost_time = start.elapsed().as_secs_f64();

    match invoke_result {
        Ok(content) => {
            process_ai_result(
                &ctx.pool,
                envelope.task_id,
                &content,
                cost_time,
                envelope.conversation_id,
                family.refusal_keywords,
            )
            .await?;
        }
        Err(e) => {
            Task::mark_failed(&ctx.pool, envelope.task_id, &e.user_message()).await?;
        }
    }
    recompute_batch(&ctx.pool, envelope.task_id).await?;

    release_node(&ctx.pool, &acquired.node_url).await?;
    ctx.stream.ack(stream_key, group, &delivery.id).await?;
    Ok(())
}

/// §9 Open Question (b): worker-side half of the batch-status advance —
/// the gateway's batch read recomputes lazily too, so a batch converges
/// to its terminal status even if nobody polls it.
async fn recompute_batch(pool: &PgPool, task_id: uuid::Uuid) -> Result<(), sqlx::Error> {
    if let Some(task) = Task::find_by_id(pool, task_id).await? {
        ChatBatch::recompute_status(pool, task.batch_id).await?;
    }
    Ok(())
}

/// §4.3 step 9 / §4.7: unconditional on every exit path past node
/// acquisition, bounded at zero on both counters.
async fn release_node(pool: &PgPool, node_url: &str) -> Result<(), sqlx::Error> {
    ServiceNode::release(pool, node_url, -1).await?;
    ServiceNode::increment_current_tasks(pool, node_url, -1).await?;
    Ok(())
}

pub(crate) async fn write_to_dlq(
    ctx: &WorkerContext,
    delivery: &Delivery,
    error: &str,
) -> Result<(), BrokerError> {
    let entry = DeadLetterEntry {
        original_id: delivery.id.clone(),
        task_id: None,
        error: error.to_string(),
        source_worker: ctx.consumer_id.clone(),
        failed_at: Utc::now(),
        raw_payload: delivery
            .payload
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
    };
    dlq::send_to_dlq(&ctx.stream, &entry).await?;
    Ok(())
}
