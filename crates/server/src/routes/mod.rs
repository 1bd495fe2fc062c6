use axum::{Router, routing::IntoMakeService};
use deployment::Deployment;
use tower_http::cors::CorsLayer;

use crate::DeploymentImpl;

pub mod batches;
pub mod chat;
pub mod conversations;
pub mod files;
pub mod health;
pub mod tasks;

pub fn router(deployment: DeploymentImpl) -> IntoMakeService<Router> {
    let upload_dir = deployment.config().upload_dir.clone();

    Router::new()
        .route("/health", axum::routing::get(health::health_check))
        .merge(chat::routes())
        .merge(tasks::routes())
        .merge(batches::routes())
        .merge(conversations::routes())
        .merge(files::routes(&upload_dir))
        .layer(CorsLayer::permissive())
        .with_state(deployment)
        .into_make_service()
}
