use std::path::Path as FsPath;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::conversation::Conversation;
use db::models::task::{Task, TaskStatus};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryMessage {
    pub task_id: Uuid,
    pub role: &'static str,
    pub content: String,
    pub is_loading: bool,
    pub files: Vec<String>,
}

/// §6.1 `/v1/conversations/{id}/history`: renders every task ever submitted
/// as a (prompt, response) pair. Failed tasks are dropped entirely rather
/// than shown as errors — `Task::find_by_conversation_id` returns the raw
/// rows, this handler applies the same rendering rules a chat UI would.
pub async fn get_history(
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<HistoryMessage>>>, ApiError> {
    let pool = &deployment.db().pool;
    Conversation::find_by_id(pool, conversation_id)
        .await?
        .ok_or(ApiError::NotFound("conversation"))?;

    let tasks = Task::find_by_conversation_id(pool, conversation_id).await?;
    let base_url = query.base_url.unwrap_or_default();

    let mut messages = Vec::with_capacity(tasks.len() * 2);
    for task in tasks {
        if task.status == TaskStatus::Failed {
            continue;
        }

        messages.push(HistoryMessage {
            task_id: task.task_id,
            role: "user",
            content: task.prompt.clone(),
            is_loading: false,
            files: task
                .file_paths_vec()
                .into_iter()
                .map(|p| file_url(&base_url, &p))
                .collect(),
        });

        let (content, is_loading) = match task.status {
            TaskStatus::Success => (task.response_text.clone().unwrap_or_default(), false),
            _ => ("thinking...".to_string(), true),
        };
        messages.push(HistoryMessage {
            task_id: task.task_id,
            role: "assistant",
            content,
            is_loading,
            files: Vec::new(),
        });
    }

    Ok(ResponseJson(ApiResponse::success(messages)))
}

pub async fn list_conversations(
    Query(query): Query<ListQuery>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Conversation>>>, ApiError> {
    let limit = query.limit.unwrap_or(50);
    let conversations = Conversation::list_recent(&deployment.db().pool, limit).await?;
    Ok(ResponseJson(ApiResponse::success(conversations)))
}

fn file_url(base_url: &str, file_path: &str) -> String {
    let basename = FsPath::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string());
    format!("{base_url}/files/{basename}")
}

pub fn routes() -> Router<DeploymentImpl> {
    Router::new()
        .route("/v1/conversations/{conversation_id}/history", get(get_history))
        .route("/v1/conversations", get(list_conversations))
}
