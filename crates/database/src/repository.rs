//! Storage seam for pathogen model records.

use async_trait::async_trait;
use model_structs::{GenericModel, GenericModelPatch, NewGenericModel};

/// Record-level operations behind the model store API.
///
/// Implemented by [`crate::PgModelRepository`] for production and by
/// [`crate::MemoryModelRepository`] for local runs and tests.
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Lists every record, most recently created first.
    async fn list(&self) -> Result<Vec<GenericModel>, sqlx::Error>;

    /// Finds a record by id.
    async fn find(&self, id: &str) -> Result<Option<GenericModel>, sqlx::Error>;

    /// Inserts a record, or refreshes the existing row with the same id.
    ///
    /// Re-creating keeps the original `created` timestamp and any content
    /// key the new submission does not provide.
    async fn upsert(&self, model: NewGenericModel) -> Result<GenericModel, sqlx::Error>;

    /// Merges `patch` into the record with `id` and returns the merged row.
    ///
    /// Returns `None` if no such record exists.
    async fn update(
        &self,
        id: &str,
        patch: &GenericModelPatch,
    ) -> Result<Option<GenericModel>, sqlx::Error>;

    /// Deletes the record with `id`. Returns `false` if nothing was deleted.
    async fn delete(&self, id: &str) -> Result<bool, sqlx::Error>;
}
