//! Sequential upload of every manifest row.

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::api::client::ModelStoreClient;
use crate::api::error::UploadError;
use crate::manifest::ManifestRow;

/// Lifecycle of one manifest row during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RowState {
    Pending,
    Uploading,
    Succeeded,
    Failed,
    Skipped,
}

/// Outcome counts of a completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl UploadSummary {
    fn record(&mut self, state: RowState) {
        match state {
            RowState::Succeeded => self.succeeded += 1,
            RowState::Failed => self.failed += 1,
            RowState::Skipped => self.skipped += 1,
            RowState::Pending | RowState::Uploading => {}
        }
    }

    /// Number of rows that reached a final state.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Uploads `rows` in order, one request at a time.
///
/// With `continue_on_error`, a row whose model file is missing is skipped
/// and a row whose upload fails is counted as failed; both are logged as
/// warnings and the run goes on. Without it, the first such row is logged
/// as an error and aborts the run, so later rows are never attempted.
///
/// # Errors
///
/// Returns the first upload error when `continue_on_error` is `false`.
pub async fn run(
    client: &ModelStoreClient,
    rows: &[ManifestRow],
    models_path: &Path,
    continue_on_error: bool,
) -> Result<UploadSummary, UploadError> {
    let total = rows.len();
    let mut summary = UploadSummary::default();

    info!("Uploading {total} models from {}", models_path.display());

    for (index, row) in rows.iter().enumerate() {
        info!("[{}/{total}] Processing {}", index + 1, row.name);

        let state = upload_row(client, row, models_path, continue_on_error).await?;
        summary.record(state);
    }

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        "Upload run complete"
    );

    Ok(summary)
}

async fn upload_row(
    client: &ModelStoreClient,
    row: &ManifestRow,
    models_path: &Path,
    continue_on_error: bool,
) -> Result<RowState, UploadError> {
    transition(row, RowState::Pending, RowState::Uploading);

    let result = client.upload_model(row, models_path).await;

    let state = match result {
        Ok(()) => RowState::Succeeded,
        Err(error @ UploadError::MissingArtifact { .. }) if continue_on_error => {
            warn!(
                "Could not find file from manifest for {}: {error}",
                row.name
            );
            RowState::Skipped
        }
        Err(error) if continue_on_error => {
            warn!("Failed to upload {}: {error}", row.filename);
            RowState::Failed
        }
        Err(error) => {
            error!("Failed to upload {}: {error}", row.filename);
            return Err(error);
        }
    };

    transition(row, RowState::Uploading, state);
    Ok(state)
}

fn transition(row: &ManifestRow, from: RowState, to: RowState) {
    debug!(filename = %row.filename, %from, %to, "Row state changed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_state_display() {
        assert_eq!(RowState::Succeeded.to_string(), "succeeded");
        assert_eq!(RowState::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_summary_records_final_states() {
        let mut summary = UploadSummary::default();
        for state in [
            RowState::Succeeded,
            RowState::Skipped,
            RowState::Succeeded,
            RowState::Failed,
            RowState::Uploading,
        ] {
            summary.record(state);
        }

        assert_eq!(
            summary,
            UploadSummary {
                succeeded: 2,
                failed: 1,
                skipped: 1,
            }
        );
        assert_eq!(summary.total(), 4);
    }
}
