use deployment::{Deployment, DeploymentError};
use server::DeploymentImpl;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::config::Config;
use uuid::Uuid;

const CONSUMER_GROUP: &str = "orchestrator_workers";

#[derive(Debug, Error)]
pub enum WorkerBinError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
}

/// One OS process, one consumer per family stream (§4.3). Each `run_consumer`
/// loop never returns, so this just fans the family registry out into
/// `tokio::spawn` and waits on whichever task ends first (a panic, since the
/// loops themselves are infinite).
#[tokio::main]
async fn main() -> Result<(), WorkerBinError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},db={level},broker={level},families={level},dispatcher={level},router={level},worker={level},deployment={level},local_deployment={level},utils={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("failed to build tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = Config::from_env();
    let deployment = DeploymentImpl::new(config).await?;

    let consumer_id = format!("worker-{}", Uuid::new_v4());
    let mut handles = Vec::new();

    for family in families::registry() {
        let ctx = deployment.worker_context(consumer_id.clone());
        let stream_key = family.stream_key.to_string();
        let consumer_id = consumer_id.clone();
        handles.push(tokio::spawn(async move {
            worker::run_consumer(ctx, &stream_key, CONSUMER_GROUP, &consumer_id).await
        }));
    }

    tracing::info!(consumer_id, "worker started, consuming all family streams");

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
