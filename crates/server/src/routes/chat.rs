use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::Json as ResponseJson,
    routing::post,
};
use deployment::Deployment;
use dispatcher::{DispatchRequest, Mode, dispatch};
use serde::{Deserialize, Serialize};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Serialize)]
pub struct ChatSubmitResponse {
    pub batch_id: Uuid,
    pub conversation_id: Uuid,
    pub task_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
struct ParsedMultipart {
    prompt: Option<String>,
    model: Option<String>,
    conversation_id: Option<Uuid>,
    mode: Option<String>,
    gemini_concurrency: Option<u32>,
}

/// §4.1 / §6.1: multipart form submission. Field parsing follows the
/// teacher's `images::upload_image` pattern of iterating `next_field` rather
/// than a typed extractor, since the field set is heterogeneous (scalars
/// plus a repeated `files[]`).
pub async fn submit_chat(
    State(deployment): State<DeploymentImpl>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<ChatSubmitResponse>>, ApiError> {
    let mut parsed = ParsedMultipart::default();
    let mut uploads: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        match field.name().map(str::to_owned).as_deref() {
            Some("prompt") => parsed.prompt = Some(field.text().await?),
            Some("model") => parsed.model = Some(field.text().await?),
            Some("mode") => parsed.mode = Some(field.text().await?),
            Some("conversation_id") => {
                let text = field.text().await?;
                parsed.conversation_id = Uuid::parse_str(&text).ok();
            }
            Some("gemini_concurrency") => {
                let text = field.text().await?;
                parsed.gemini_concurrency = text.parse().ok();
            }
            Some("files[]") | Some("files") => {
                let filename = field
                    .file_name()
                    .map(str::to_owned)
                    .unwrap_or_else(|| "upload".to_string());
                let bytes = field.bytes().await?;
                uploads.push((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let prompt = parsed
        .prompt
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("prompt must not be empty".to_string()))?;
    let model_config = parsed.model.unwrap_or_default();
    let mode = Mode::from_param(parsed.mode.as_deref());

    let file_paths = dispatcher::upload::persist_uploads(&deployment.config().upload_dir, uploads).await;

    let result = dispatch(
        &deployment.db().pool,
        deployment.stream(),
        DispatchRequest {
            prompt,
            model_config,
            conversation_id: parsed.conversation_id,
            file_paths,
            mode,
            gemini_concurrency: parsed.gemini_concurrency,
        },
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(ChatSubmitResponse {
        batch_id: result.batch_id,
        conversation_id: result.conversation_id,
        task_ids: result.task_ids,
    })))
}

pub fn routes() -> Router<DeploymentImpl> {
    Router::new().route(
        "/v1/chat/completions",
        post(submit_chat).layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
    )
}
