use axum::{Router, extract::{Path, State}, response::Json as ResponseJson, routing::get};
use db::models::task::Task;
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

pub async fn get_task(
    Path(task_id): Path<Uuid>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::find_by_id(&deployment.db().pool, task_id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub fn routes() -> Router<DeploymentImpl> {
    Router::new().route("/v1/tasks/{task_id}", get(get_task))
}
