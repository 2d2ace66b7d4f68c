//! Model store API server.
//!
//! Serves pathogen model metadata and artifacts over HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use config::{Config, open_object_store};
use database::{ArtifactStore, MemoryModelRepository, ModelRepository, PgModelRepository};
use model_store_api::{AppState, router, serve};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let repository: Arc<dyn ModelRepository> = if let Some(database_url) = &config.database_url {
        let repository = PgModelRepository::connect(database_url, config.database_max_connections)
            .await
            .context("Failed to connect to database")?;
        repository
            .migrate()
            .await
            .context("Failed to run migrations")?;
        Arc::new(repository)
    } else {
        warn!("DATABASE_URL not set, model records are kept in memory only");
        Arc::new(MemoryModelRepository::new())
    };

    let artifacts = ArtifactStore::new(
        open_object_store(&config.model_store_path).context("Failed to open model store")?,
    );
    info!(path = %config.model_store_path.display(), "Model artifacts stored on disk");

    if config.api_key.is_none() {
        warn!("MODEL_STORE_API_KEY not set, mutating requests are not authenticated");
    }

    let state = AppState::new(repository, artifacts, config.api_key.clone());

    let listener = TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Model store API listening");

    serve(listener, router(state, config.max_upload_bytes)).await?;

    info!("Model store API stopped");
    Ok(())
}
