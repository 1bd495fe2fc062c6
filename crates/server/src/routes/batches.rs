use axum::{Router, extract::{Path, State}, response::Json as ResponseJson, routing::get};
use db::models::task::Task;
use db::models::task_batch::ChatBatch;
use deployment::Deployment;
use serde::Serialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Serialize)]
pub struct BatchWithTasks {
    #[serde(flatten)]
    pub batch: ChatBatch,
    pub tasks: Vec<Task>,
}

pub async fn get_batch(
    Path(batch_id): Path<Uuid>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<BatchWithTasks>>, ApiError> {
    let pool = &deployment.db().pool;
    let batch = ChatBatch::find_by_id(pool, batch_id)
        .await?
        .ok_or(ApiError::NotFound("batch"))?;

    // §9 Open Question (b): batch status has no in-place advance path in
    // the source, so it's recomputed lazily on read rather than only from
    // a worker-side hook — a poll always sees the freshest aggregate.
    ChatBatch::recompute_status(pool, batch_id).await?;
    let batch = ChatBatch::find_by_id(pool, batch_id).await?.unwrap_or(batch);

    let tasks = Task::find_by_batch_id(pool, batch_id).await?;
    Ok(ResponseJson(ApiResponse::success(BatchWithTasks { batch, tasks })))
}

pub fn routes() -> Router<DeploymentImpl> {
    Router::new().route("/v1/batches/{batch_id}", get(get_batch))
}
