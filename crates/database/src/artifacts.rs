//! Blob storage for uploaded model artifacts, keyed by model id.

use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path as ObjectStorePath;
use object_store::{ObjectStore, PutPayload};
use tracing::debug;

/// The kinds of artifact a pathogen model can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The trained model file (`model` form part).
    Model,
    /// The serialized R object (`rds` form part).
    Rds,
}

impl ArtifactKind {
    pub const ALL: [Self; 2] = [Self::Model, Self::Rds];

    /// Object store location of this artifact for the given model id.
    ///
    /// Locations are derived from the id alone, never from content keys.
    #[must_use]
    pub fn path_for(self, model_id: &str) -> ObjectStorePath {
        match self {
            Self::Model => ObjectStorePath::from(format!("models/{model_id}")),
            Self::Rds => ObjectStorePath::from(format!("models/{model_id}.rds")),
        }
    }
}

/// Artifact store over any `object_store` backend.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Writes an artifact, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn save(
        &self,
        model_id: &str,
        kind: ArtifactKind,
        data: Bytes,
    ) -> Result<(), object_store::Error> {
        let path = kind.path_for(model_id);
        debug!(%path, bytes = data.len(), "Saving artifact");
        self.store.put(&path, PutPayload::from(data)).await?;
        Ok(())
    }

    /// Reads an artifact, returning `None` if it was never stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails for any reason other than a missing object.
    pub async fn read(
        &self,
        model_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<Bytes>, object_store::Error> {
        match self.store.get(&kind.path_for(model_id)).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Removes an artifact. Removing a missing artifact is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails for any reason other than a missing object.
    pub async fn remove(&self, model_id: &str, kind: ArtifactKind) -> Result<(), object_store::Error> {
        match self.store.delete(&kind.path_for(model_id)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(error) => Err(error),
        }
    }
}
