use broker::{StreamClient, TaskEnvelope};
use db::models::conversation::Conversation;
use db::models::task::{Task, TaskType};
use db::models::task_batch::ChatBatch;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::model_list::normalize_models;
use crate::preselect::select_nodes;

const IMAGE_PREAMBLE: &str =
    "请根据以下描述生成一张图片，只返回图片，不要输出其他说明文字：\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Text,
    Image,
}

impl Mode {
    pub fn from_param(mode: Option<&str>) -> Mode {
        match mode {
            Some("image") => Mode::Image,
            _ => Mode::Text,
        }
    }
}

pub struct DispatchRequest {
    pub prompt: String,
    pub model_config: String,
    pub conversation_id: Option<Uuid>,
    pub file_paths: Vec<String>,
    pub mode: Mode,
    pub gemini_concurrency: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub batch_id: Uuid,
    pub conversation_id: Uuid,
    pub task_ids: Vec<Uuid>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// §4.1: transactionally-adjacent batch creation — the batch row and its
/// children are each inserted with their own statement rather than a single
/// wrapping transaction, matching the teacher's `DbService` style of one
/// `PgPool` passed by reference rather than an explicit `Transaction`
/// threaded through every call. A DB error here aborts the whole request
/// (surfaced by the gateway as 5xx); a per-slot enqueue failure does not.
pub async fn dispatch(
    pool: &PgPool,
    stream: &StreamClient,
    req: DispatchRequest,
) -> Result<DispatchResult, DispatchError> {
    let conversation = Conversation::find_or_create(pool, req.conversation_id, &req.prompt).await?;
    let batch = ChatBatch::create(
        pool,
        Uuid::new_v4(),
        conversation.conversation_id,
        &req.prompt,
        &req.model_config,
    )
    .await?;

    let models = normalize_models(&req.model_config);
    let mut task_ids = Vec::new();

    for model in &models {
        let family = families::resolve(model);
        let concurrency = family.concurrency_policy.resolve(req.gemini_concurrency);
        let node_urls = select_nodes(pool, &family, concurrency).await?;

        let task_type = TaskType::classify(req.mode == Mode::Image, !req.file_paths.is_empty());
        let worker_prompt = match req.mode {
            Mode::Image => format!("{IMAGE_PREAMBLE}{}", req.prompt),
            Mode::Text => req.prompt.clone(),
        };

        for (i, target_node_url) in node_urls.into_iter().enumerate() {
            let display_model_name = if concurrency == 1 {
                model.clone()
            } else {
                format!("{model} (#{})", i + 1)
            };

            let task = Task::create(
                pool,
                Uuid::new_v4(),
                batch.batch_id,
                conversation.conversation_id,
                &req.prompt,
                &display_model_name,
                task_type,
                &req.file_paths,
            )
            .await?;
            task_ids.push(task.task_id);

            let envelope = TaskEnvelope {
                task_id: task.task_id,
                conversation_id: conversation.conversation_id,
                prompt: worker_prompt.clone(),
                model: display_model_name,
                file_paths: req.file_paths.clone(),
                target_node_url,
                slot_id: i,
            };

            if let Err(e) = stream.enqueue(family.stream_key, &envelope, None).await {
                tracing::warn!(task_id = %task.task_id, error = %e, "failed to enqueue task");
                Task::mark_failed(pool, task.task_id, &format!("MQ Error: {e}")).await?;
            }
        }
    }

    Ok(DispatchResult {
        batch_id: batch.batch_id,
        conversation_id: conversation.conversation_id,
        task_ids,
    })
}
