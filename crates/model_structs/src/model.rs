use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::model_id;

/// Pathogen model metadata stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GenericModel {
    pub id: String,
    pub name: String,
    pub query_str: String,
    pub model_type: String,
    pub rds_key: Option<String>,
    pub model_key: Option<String>,
    pub created: DateTime<Utc>,
}

/// Input for creating (or re-creating) a pathogen model record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGenericModel {
    pub id: String,
    pub name: String,
    pub query_str: String,
    pub model_type: String,
    pub rds_key: Option<String>,
    pub model_key: Option<String>,
}

impl NewGenericModel {
    /// Builds a record whose id is derived from `query_str`.
    pub fn new(
        name: impl Into<String>,
        query_str: impl Into<String>,
        model_type: impl Into<String>,
    ) -> Self {
        let query_str = query_str.into();
        Self {
            id: model_id(&query_str),
            name: name.into(),
            query_str,
            model_type: model_type.into(),
            rds_key: None,
            model_key: None,
        }
    }

    #[must_use]
    pub fn with_model_key(mut self, model_key: Option<String>) -> Self {
        self.model_key = model_key;
        self
    }

    #[must_use]
    pub fn with_rds_key(mut self, rds_key: Option<String>) -> Self {
        self.rds_key = rds_key;
        self
    }
}

/// Partial update payload.
///
/// Only fields present in the payload are merged. The record id is never
/// part of a patch: an `id` key in the incoming JSON is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericModelPatch {
    pub name: Option<String>,
    pub query_str: Option<String>,
    pub model_type: Option<String>,
    pub rds_key: Option<String>,
    pub model_key: Option<String>,
}

impl GenericModelPatch {
    /// Returns `true` if the patch would not change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.query_str.is_none()
            && self.model_type.is_none()
            && self.rds_key.is_none()
            && self.model_key.is_none()
    }

    /// Merges the present fields into `model`, leaving `id` and `created` untouched.
    pub fn apply(&self, model: &mut GenericModel) {
        if let Some(name) = &self.name {
            model.name.clone_from(name);
        }
        if let Some(query_str) = &self.query_str {
            model.query_str.clone_from(query_str);
        }
        if let Some(model_type) = &self.model_type {
            model.model_type.clone_from(model_type);
        }
        if let Some(rds_key) = &self.rds_key {
            model.rds_key = Some(rds_key.clone());
        }
        if let Some(model_key) = &self.model_key {
            model.model_key = Some(model_key.clone());
        }
    }
}
