//! Model store API.
//!
//! CRUD over pathogen model records, with uploaded artifacts kept in an
//! object store under paths derived from each model's id.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use database::{ArtifactStore, ModelRepository};
use tokio::net::TcpListener;
use tracing::{info, warn};

mod auth;
mod error;
mod extract;
pub mod handlers;
mod submission;

pub use error::{ApiError, ErrorBody};
pub use extract::{ApiJson, ModelId};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn ModelRepository>,
    pub artifacts: ArtifactStore,
    /// Bearer key required on mutating requests. `None` disables the check.
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn ModelRepository>,
        artifacts: ArtifactStore,
        api_key: Option<String>,
    ) -> Self {
        Self {
            repository,
            artifacts,
            api_key: api_key.map(Arc::from),
        }
    }
}

/// Builds the API router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/pathogen_models",
            get(handlers::list_models).post(handlers::create_models),
        )
        .route(
            "/pathogen_models/:id",
            get(handlers::get_model)
                .put(handlers::update_model)
                .delete(handlers::delete_model),
        )
        .route("/pathogen_models/:id/model", get(handlers::download_model))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Serves `app` until Ctrl-C is received.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(error) => warn!("Failed to listen for shutdown signal: {error}"),
    }
}
