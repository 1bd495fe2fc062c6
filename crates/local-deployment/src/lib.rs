use async_trait::async_trait;
use broker::StreamClient;
use db::DbService;
use deployment::{Deployment, DeploymentError};
use utils::config::Config;
use worker::backend::BackendClient;

/// The one concrete `Deployment` this workspace ships: a real Postgres
/// pool, a real Redis stream client, and a pooled HTTP client for backend
/// calls, all built from `Config::from_env()`.
#[derive(Clone)]
pub struct LocalDeployment {
    config: Config,
    db: DbService,
    stream: StreamClient,
    backend: BackendClient,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new(config: Config) -> Result<Self, DeploymentError> {
        let db = DbService::new(&config.database_url).await?;
        let stream = StreamClient::new(&config.redis_url)?;
        let backend = BackendClient::new();

        Ok(Self {
            config,
            db,
            stream,
            backend,
        })
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DbService {
        &self.db
    }

    fn stream(&self) -> &StreamClient {
        &self.stream
    }

    fn backend(&self) -> &BackendClient {
        &self.backend
    }
}
