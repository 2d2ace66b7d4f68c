//! In-memory repository used when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use model_structs::{GenericModel, GenericModelPatch, NewGenericModel};
use tokio::sync::Mutex;

use crate::repository::ModelRepository;

#[derive(Debug)]
struct Entry {
    /// Insertion sequence, breaks ties between equal `created` timestamps.
    seq: u64,
    model: GenericModel,
}

#[derive(Debug, Default)]
struct Rows {
    next_seq: u64,
    by_id: HashMap<String, Entry>,
}

/// Process-local repository with the same semantics as [`crate::PgModelRepository`].
#[derive(Debug, Default)]
pub struct MemoryModelRepository {
    rows: Mutex<Rows>,
}

impl MemoryModelRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelRepository for MemoryModelRepository {
    async fn list(&self) -> Result<Vec<GenericModel>, sqlx::Error> {
        let rows = self.rows.lock().await;
        let mut entries: Vec<&Entry> = rows.by_id.values().collect();
        entries.sort_by(|a, b| {
            b.model
                .created
                .cmp(&a.model.created)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(entries.into_iter().map(|entry| entry.model.clone()).collect())
    }

    async fn find(&self, id: &str) -> Result<Option<GenericModel>, sqlx::Error> {
        let rows = self.rows.lock().await;
        Ok(rows.by_id.get(id).map(|entry| entry.model.clone()))
    }

    async fn upsert(&self, model: NewGenericModel) -> Result<GenericModel, sqlx::Error> {
        let mut rows = self.rows.lock().await;

        if let Some(entry) = rows.by_id.get_mut(&model.id) {
            let existing = &mut entry.model;
            existing.name = model.name;
            existing.query_str = model.query_str;
            existing.model_type = model.model_type;
            if model.rds_key.is_some() {
                existing.rds_key = model.rds_key;
            }
            if model.model_key.is_some() {
                existing.model_key = model.model_key;
            }
            return Ok(existing.clone());
        }

        let seq = rows.next_seq;
        rows.next_seq += 1;

        let created = GenericModel {
            id: model.id,
            name: model.name,
            query_str: model.query_str,
            model_type: model.model_type,
            rds_key: model.rds_key,
            model_key: model.model_key,
            created: Utc::now(),
        };
        rows.by_id.insert(
            created.id.clone(),
            Entry {
                seq,
                model: created.clone(),
            },
        );

        Ok(created)
    }

    async fn update(
        &self,
        id: &str,
        patch: &GenericModelPatch,
    ) -> Result<Option<GenericModel>, sqlx::Error> {
        let mut rows = self.rows.lock().await;
        Ok(rows.by_id.get_mut(id).map(|entry| {
            patch.apply(&mut entry.model);
            entry.model.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut rows = self.rows.lock().await;
        Ok(rows.by_id.remove(id).is_some())
    }
}
