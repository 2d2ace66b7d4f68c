//! HTTP request handlers
//!
//! Axum handlers for the `/pathogen_models` API.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use bytes::Bytes;
use database::ArtifactKind;
use model_structs::{GenericModel, GenericModelPatch, NewGenericModel, content_key};
use serde_json::json;
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ModelId};
use crate::submission::{ModelSubmission, read_submissions};

/// Health check handler
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// List all pathogen models, most recently created first
///
/// # Errors
///
/// Returns an error if the repository query fails.
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<GenericModel>>, ApiError> {
    let models = state.repository.list().await?;
    Ok(Json(models))
}

/// Get a pathogen model by ID
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if no model has this id.
pub async fn get_model(
    State(state): State<AppState>,
    ModelId(id): ModelId,
) -> Result<Json<GenericModel>, ApiError> {
    match state.repository.find(&id).await? {
        Some(model) => Ok(Json(model)),
        None => Err(ApiError::NotFound(id)),
    }
}

/// Create one or more pathogen models from a multipart form
///
/// Responds with the last created record.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if the form holds no submission or its
/// batch fields disagree in length, and storage errors otherwise.
pub async fn create_models(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<GenericModel>), ApiError> {
    let submissions = read_submissions(multipart).await?;

    let mut last_created = None;
    for submission in submissions {
        last_created = Some(insert_one_model(&state, submission).await?);
    }

    match last_created {
        Some(model) => Ok((StatusCode::CREATED, Json(model))),
        None => Err(ApiError::BadRequest("Unknown error".to_string())),
    }
}

/// Stores the artifacts of one submission, then its row.
///
/// Artifacts go first so a row never points at a file that was never
/// written. If the row write fails, each artifact written here is put back
/// to what it was before: the previous version is restored, or the new
/// file is removed if there was none.
async fn insert_one_model(
    state: &AppState,
    submission: ModelSubmission,
) -> Result<GenericModel, ApiError> {
    let ModelSubmission {
        name,
        query_str,
        model_type,
        model,
        rds,
    } = submission;

    let record = NewGenericModel::new(name, query_str, model_type)
        .with_model_key(model.as_deref().map(content_key))
        .with_rds_key(rds.as_deref().map(content_key));
    let model_id = record.id.clone();

    let mut replaced: Vec<(ArtifactKind, Option<Bytes>)> = Vec::new();
    for (kind, data) in [(ArtifactKind::Model, model), (ArtifactKind::Rds, rds)] {
        let Some(data) = data else {
            continue;
        };
        match replace_artifact(state, &model_id, kind, data).await {
            Ok(previous) => replaced.push((kind, previous)),
            Err(error) => {
                roll_back_artifacts(state, &model_id, replaced).await;
                return Err(error.into());
            }
        }
    }

    match state.repository.upsert(record).await {
        Ok(created) => {
            info!(
                model_id = %created.id,
                name = %created.name,
                artifacts = replaced.len(),
                "Stored pathogen model"
            );
            Ok(created)
        }
        Err(error) => {
            roll_back_artifacts(state, &model_id, replaced).await;
            Err(error.into())
        }
    }
}

/// Writes `data` and returns the version it replaced, if any.
async fn replace_artifact(
    state: &AppState,
    model_id: &str,
    kind: ArtifactKind,
    data: Bytes,
) -> Result<Option<Bytes>, object_store::Error> {
    let previous = state.artifacts.read(model_id, kind).await?;
    state.artifacts.save(model_id, kind, data).await?;
    Ok(previous)
}

/// Puts artifacts back to their state before a failed create.
async fn roll_back_artifacts(
    state: &AppState,
    model_id: &str,
    replaced: Vec<(ArtifactKind, Option<Bytes>)>,
) {
    for (kind, previous) in replaced {
        let result = match previous {
            Some(data) => state.artifacts.save(model_id, kind, data).await,
            None => state.artifacts.remove(model_id, kind).await,
        };
        if let Err(error) = result {
            warn!(model_id, ?kind, "Failed to roll back artifact: {error}");
        }
    }
}

/// Best-effort removal of artifacts, logging failures instead of returning them.
async fn discard_artifacts(state: &AppState, model_id: &str, kinds: &[ArtifactKind]) {
    for &kind in kinds {
        if let Err(error) = state.artifacts.remove(model_id, kind).await {
            warn!(model_id, ?kind, "Failed to remove artifact: {error}");
        }
    }
}

/// Update a pathogen model
///
/// Fields present in the payload are merged into the stored record; the id
/// never changes. Responds with the merged record.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if no model has this id.
pub async fn update_model(
    State(state): State<AppState>,
    ModelId(id): ModelId,
    ApiJson(patch): ApiJson<GenericModelPatch>,
) -> Result<Json<GenericModel>, ApiError> {
    match state.repository.update(&id, &patch).await? {
        Some(updated) => {
            info!(model_id = %updated.id, "Updated pathogen model");
            Ok(Json(updated))
        }
        None => Err(ApiError::NotFound(id)),
    }
}

/// Delete a pathogen model and its artifacts
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if no model has this id.
pub async fn delete_model(
    State(state): State<AppState>,
    ModelId(id): ModelId,
) -> Result<(StatusCode, String), ApiError> {
    if !state.repository.delete(&id).await? {
        return Err(ApiError::NotFound(id));
    }

    // The row is gone; leftover files are only logged.
    discard_artifacts(&state, &id, &ArtifactKind::ALL).await;

    info!(model_id = %id, "Deleted pathogen model");
    Ok((StatusCode::OK, format!("Pathogen Model {id} deleted")))
}

/// Download the model artifact of a pathogen model
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if no model has this id and
/// [`ApiError::ArtifactNotFound`] if it has no stored model file.
pub async fn download_model(
    State(state): State<AppState>,
    ModelId(id): ModelId,
) -> Result<impl IntoResponse, ApiError> {
    if state.repository.find(&id).await?.is_none() {
        return Err(ApiError::NotFound(id));
    }

    let data: Bytes = state
        .artifacts
        .read(&id, ArtifactKind::Model)
        .await?
        .ok_or_else(|| ApiError::ArtifactNotFound(id.clone()))?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use database::{ArtifactStore, MemoryModelRepository, ModelRepository};
    use object_store::memory::InMemory;

    use super::*;

    /// Repository whose row writes always fail.
    struct FailingUpserts {
        rows: Arc<MemoryModelRepository>,
    }

    #[async_trait]
    impl ModelRepository for FailingUpserts {
        async fn list(&self) -> Result<Vec<GenericModel>, sqlx::Error> {
            self.rows.list().await
        }

        async fn find(&self, id: &str) -> Result<Option<GenericModel>, sqlx::Error> {
            self.rows.find(id).await
        }

        async fn upsert(&self, _model: NewGenericModel) -> Result<GenericModel, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }

        async fn update(
            &self,
            id: &str,
            patch: &GenericModelPatch,
        ) -> Result<Option<GenericModel>, sqlx::Error> {
            self.rows.update(id, patch).await
        }

        async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
            self.rows.delete(id).await
        }
    }

    fn failing_state(rows: Arc<MemoryModelRepository>, artifacts: ArtifactStore) -> AppState {
        AppState::new(Arc::new(FailingUpserts { rows }), artifacts, None)
    }

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(MemoryModelRepository::new()),
            ArtifactStore::new(Arc::new(InMemory::new())),
            None,
        )
    }

    fn submission(name: &str, query_str: &str, model: Option<&'static [u8]>) -> ModelSubmission {
        ModelSubmission {
            name: name.to_string(),
            query_str: query_str.to_string(),
            model_type: "inla".to_string(),
            model: model.map(Bytes::from_static),
            rds: None,
        }
    }

    #[tokio::test]
    async fn test_insert_one_model_stores_row_and_artifact() {
        let state = test_state();

        let created = insert_one_model(&state, submission("flu", r#"{"a":1}"#, Some(b"x,y\n")))
            .await
            .expect("insert should succeed");

        assert_eq!(created.id, model_structs::model_id(r#"{"a":1}"#));
        assert_eq!(created.model_key, Some(content_key(b"x,y\n")));
        assert!(created.rds_key.is_none());

        let stored = state
            .artifacts
            .read(&created.id, ArtifactKind::Model)
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some(&b"x,y\n"[..]));
    }

    #[tokio::test]
    async fn test_failed_row_write_removes_new_artifacts() {
        let artifacts = ArtifactStore::new(Arc::new(InMemory::new()));
        let state = failing_state(Arc::new(MemoryModelRepository::new()), artifacts.clone());

        let mut fresh = submission("flu", "fresh", Some(b"model"));
        fresh.rds = Some(Bytes::from_static(b"rds"));
        let id = model_structs::model_id("fresh");

        let err = insert_one_model(&state, fresh).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        for kind in ArtifactKind::ALL {
            assert!(artifacts.read(&id, kind).await.unwrap().is_none());
        }
        assert!(state.repository.find(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_recreate_restores_previous_artifact() {
        let rows = Arc::new(MemoryModelRepository::new());
        let artifacts = ArtifactStore::new(Arc::new(InMemory::new()));
        let healthy = AppState::new(rows.clone(), artifacts.clone(), None);

        let created = insert_one_model(&healthy, submission("flu", "q", Some(b"first")))
            .await
            .unwrap();

        let failing = failing_state(rows, artifacts.clone());
        let mut resubmitted = submission("flu", "q", Some(b"second"));
        resubmitted.rds = Some(Bytes::from_static(b"rds"));
        insert_one_model(&failing, resubmitted).await.unwrap_err();

        let row = failing.repository.find(&created.id).await.unwrap().unwrap();
        assert_eq!(row.model_key, Some(content_key(b"first")));

        let stored = artifacts.read(&created.id, ArtifactKind::Model).await.unwrap();
        assert_eq!(stored.as_deref(), Some(&b"first"[..]));
        assert!(
            artifacts
                .read(&created.id, ArtifactKind::Rds)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_get_model() {
        let state = test_state();
        let created = insert_one_model(&state, submission("flu", "q", None))
            .await
            .unwrap();

        let Json(found) = get_model(State(state), ModelId(created.id.clone()))
            .await
            .expect("model should exist");
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_get_model_not_found() {
        let state = test_state();

        let err = get_model(State(state), ModelId("nonexistent".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("nonexistent"));
    }

    #[tokio::test]
    async fn test_list_models() {
        let state = test_state();
        insert_one_model(&state, submission("first", "1", None)).await.unwrap();
        insert_one_model(&state, submission("second", "2", None)).await.unwrap();

        let Json(models) = list_models(State(state)).await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "second");
    }

    #[tokio::test]
    async fn test_update_model_returns_merged_record() {
        let state = test_state();
        let created = insert_one_model(&state, submission("flu", "q", None))
            .await
            .unwrap();

        let patch: GenericModelPatch =
            serde_json::from_value(json!({"id": "hijack", "name": "renamed"})).unwrap();
        let Json(updated) = update_model(
            State(state.clone()),
            ModelId(created.id.clone()),
            ApiJson(patch),
        )
        .await
        .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "renamed");
        assert!(state.repository.find("hijack").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_model_not_found() {
        let state = test_state();

        let err = update_model(
            State(state),
            ModelId("missing".to_string()),
            ApiJson(GenericModelPatch::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_model_removes_row_and_artifact() {
        let state = test_state();
        let created = insert_one_model(&state, submission("flu", "q", Some(b"data")))
            .await
            .unwrap();

        let (status, message) = delete_model(State(state.clone()), ModelId(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message, format!("Pathogen Model {} deleted", created.id));

        assert!(state.repository.find(&created.id).await.unwrap().is_none());
        assert!(
            state
                .artifacts
                .read(&created.id, ArtifactKind::Model)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_model_not_found() {
        let state = test_state();

        let err = delete_model(State(state), ModelId("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("missing"));
    }
}
