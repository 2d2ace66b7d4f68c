//! Multipart create payloads.
//!
//! A create request carries either one submission or a batch. In a batch,
//! every field repeats once per submission and the k-th value of each field
//! belongs to the k-th submission. Both shapes are normalized into an
//! explicit list before anything is written.

use axum::extract::Multipart;
use bytes::Bytes;
use tracing::debug;

use crate::error::ApiError;

/// One model to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelSubmission {
    pub name: String,
    pub query_str: String,
    pub model_type: String,
    pub model: Option<Bytes>,
    pub rds: Option<Bytes>,
}

/// Field values collected from a create form, in arrival order.
#[derive(Debug, Default)]
pub(crate) struct SubmissionForm {
    names: Vec<String>,
    query_strs: Vec<String>,
    model_types: Vec<String>,
    models: Vec<Bytes>,
    rds: Vec<Bytes>,
}

impl SubmissionForm {
    /// Records a text field. Returns `false` for fields the API does not use.
    pub fn push_text(&mut self, field: &str, value: String) -> bool {
        match field {
            "name" => self.names.push(value),
            "query_str" => self.query_strs.push(value),
            "model_type" => self.model_types.push(value),
            _ => return false,
        }
        true
    }

    /// Records a file field. Returns `false` for fields the API does not use.
    pub fn push_file(&mut self, field: &str, data: Bytes) -> bool {
        match field {
            "model" => self.models.push(data),
            "rds" => self.rds.push(data),
            _ => return false,
        }
        true
    }

    /// Splits the collected fields into one submission per `name` value.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] if the required fields do not all
    /// repeat the same number of times, or if a file field repeats a
    /// different number of times than `name` (it may also be absent).
    pub fn into_submissions(self) -> Result<Vec<ModelSubmission>, ApiError> {
        let count = self.names.len();
        let optional_ok = |len: usize| len == 0 || len == count;

        if self.query_strs.len() != count
            || self.model_types.len() != count
            || !optional_ok(self.models.len())
            || !optional_ok(self.rds.len())
        {
            return Err(ApiError::BadRequest(
                "Mismatched batch field lengths".to_string(),
            ));
        }

        let mut models = self.models.into_iter();
        let mut rds = self.rds.into_iter();

        Ok(self
            .names
            .into_iter()
            .zip(self.query_strs)
            .zip(self.model_types)
            .map(|((name, query_str), model_type)| ModelSubmission {
                name,
                query_str,
                model_type,
                model: models.next(),
                rds: rds.next(),
            })
            .collect())
    }
}

/// Reads a multipart create request into its submissions.
///
/// # Errors
///
/// Returns an error if the body is not valid multipart or the batch shape is inconsistent.
pub(crate) async fn read_submissions(mut multipart: Multipart) -> Result<Vec<ModelSubmission>, ApiError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        let used = if field.file_name().is_some() || matches!(name.as_str(), "model" | "rds") {
            let data = field.bytes().await?;
            form.push_file(&name, data)
        } else {
            let value = field.text().await?;
            form.push_text(&name, value)
        };

        if !used {
            debug!(field = %name, "Ignoring form field");
        }
    }

    form.into_submissions()
}
