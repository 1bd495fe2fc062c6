use axum::Router;
use tower_http::services::ServeDir;

use crate::DeploymentImpl;

/// §6.1: serves persisted uploads at `/files/{basename}`. The directory
/// itself is whatever `dispatcher::upload::persist_uploads` wrote into,
/// so this route carries no extra routing logic of its own.
pub fn routes(upload_dir: &std::path::Path) -> Router<DeploymentImpl> {
    Router::new().nest_service("/files", ServeDir::new(upload_dir))
}
