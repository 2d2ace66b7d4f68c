use std::path::PathBuf;

use thiserror::Error;

/// Ways a single model upload can fail.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not find model file {}", .path.display())]
    MissingArtifact { path: PathBuf },

    #[error("failed to read model file {}: {source}", .path.display())]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload failed with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("rate limited by server (429): {body}")]
    RateLimited { body: String },

    #[error("request to model store failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl UploadError {
    /// Only rate limiting is transient; everything else is final.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
