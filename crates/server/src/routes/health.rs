use axum::{Json, extract::State};
use deployment::Deployment;
use serde::Serialize;

use crate::DeploymentImpl;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub broker: &'static str,
}

/// §6.1: `{status: "ok", broker: <ping-result>}`. Never returns an error
/// status itself — a dead broker is reported in the body, not via 5xx,
/// since the gateway can still serve reads against the DB.
pub async fn health_check(State(deployment): State<DeploymentImpl>) -> Json<HealthResponse> {
    let broker = match deployment.stream().ping().await {
        Ok(()) => "ok",
        Err(_) => "unreachable",
    };
    Json(HealthResponse {
        status: "ok",
        broker,
    })
}
