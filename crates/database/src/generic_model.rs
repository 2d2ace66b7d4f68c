//! `PostgreSQL` repository for pathogen model records.

use core::time::Duration;

use async_trait::async_trait;
use model_structs::{GenericModel, GenericModelPatch, NewGenericModel};
use sqlx::PgPool;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::repository::ModelRepository;

/// Repository backed by the `generic_models` table.
#[derive(Debug, Clone)]
pub struct PgModelRepository {
    pool: PgPool,
}

impl PgModelRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        info!(max_connections, "Connected to model database");
        Ok(Self::new(pool))
    }

    /// Brings the `generic_models` schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Model database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl ModelRepository for PgModelRepository {
    async fn list(&self) -> Result<Vec<GenericModel>, sqlx::Error> {
        sqlx::query_as::<_, GenericModel>(
            r"
            SELECT id, name, query_str, model_type, rds_key, model_key, created
            FROM generic_models
            ORDER BY created DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn find(&self, id: &str) -> Result<Option<GenericModel>, sqlx::Error> {
        sqlx::query_as::<_, GenericModel>(
            r"
            SELECT id, name, query_str, model_type, rds_key, model_key, created
            FROM generic_models
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn upsert(&self, model: NewGenericModel) -> Result<GenericModel, sqlx::Error> {
        sqlx::query_as::<_, GenericModel>(
            r"
            INSERT INTO generic_models (id, name, query_str, model_type, rds_key, model_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                query_str = EXCLUDED.query_str,
                model_type = EXCLUDED.model_type,
                rds_key = COALESCE(EXCLUDED.rds_key, generic_models.rds_key),
                model_key = COALESCE(EXCLUDED.model_key, generic_models.model_key)
            RETURNING id, name, query_str, model_type, rds_key, model_key, created
            ",
        )
        .bind(model.id)
        .bind(model.name)
        .bind(model.query_str)
        .bind(model.model_type)
        .bind(model.rds_key)
        .bind(model.model_key)
        .fetch_one(&self.pool)
        .await
    }

    async fn update(
        &self,
        id: &str,
        patch: &GenericModelPatch,
    ) -> Result<Option<GenericModel>, sqlx::Error> {
        sqlx::query_as::<_, GenericModel>(
            r"
            UPDATE generic_models SET
                name = COALESCE($2, name),
                query_str = COALESCE($3, query_str),
                model_type = COALESCE($4, model_type),
                rds_key = COALESCE($5, rds_key),
                model_key = COALESCE($6, model_key)
            WHERE id = $1
            RETURNING id, name, query_str, model_type, rds_key, model_key, created
            ",
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.query_str.as_deref())
        .bind(patch.model_type.as_deref())
        .bind(patch.rds_key.as_deref())
        .bind(patch.model_key.as_deref())
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generic_models WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
