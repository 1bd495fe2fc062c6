use async_trait::async_trait;
use broker::{BrokerError, StreamClient};
use db::DbService;
use thiserror::Error;
use utils::config::Config;
use worker::backend::BackendClient;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Dependency-injected handle bundle, replacing the source's process-level
/// singletons for the DB pool and broker connection (§9 Design Notes:
/// "Global mutable state"). Both the gateway (`server`) and the worker
/// binaries construct one concrete `Deployment` at startup and thread it
/// through every handler/loop rather than reaching for statics.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new(config: Config) -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DbService;

    fn stream(&self) -> &StreamClient;

    fn backend(&self) -> &BackendClient;

    /// Builds a `worker::WorkerContext` bound to `consumer_id`, the one
    /// piece of per-consumer identity the generic handle bundle doesn't
    /// otherwise carry.
    fn worker_context(&self, consumer_id: String) -> worker::WorkerContext {
        worker::WorkerContext {
            pool: self.db().pool.clone(),
            stream: self.stream().clone(),
            backend: self.backend().clone(),
            consumer_id,
        }
    }
}
