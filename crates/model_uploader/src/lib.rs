//! Pathogen model uploader library.
//!
//! Reads the manifest written by the training pipeline and uploads each
//! trained model to the model store API, one request at a time, under a
//! shared rate limit.

pub mod api;
mod config;
mod manifest;
mod uploader;

pub use api::client::ModelStoreClient;
pub use api::error::UploadError;
pub use config::{DEFAULT_API_URL, MAX_ATTEMPTS, RATE_LIMIT_PER_SECOND, RetryPolicy, UploadSettings};
pub use manifest::{ManifestError, ManifestRow, parse_manifest, read_manifest};
pub use uploader::{RowState, UploadSummary, run};
