use deployment::{Deployment, DeploymentError};
use server::{DeploymentImpl, routes};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::config::Config;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
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
    std::fs::create_dir_all(&config.upload_dir)?;

    let host = config.host.clone();
    let port = config.port;

    let deployment = DeploymentImpl::new(config).await?;
    let app_router = routes::router(deployment);

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_addr = listener.local_addr()?;
    tracing::info!("gateway listening on http://{actual_addr}");

    axum::serve(listener, app_router).await?;
    Ok(())
}
