//! Reader for the tab-separated model manifest (`modelDB.tsv`).

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to open manifest {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest: {0}")]
    Parse(#[from] csv::Error),
}

/// One trained model listed in the manifest.
///
/// Extra columns in the manifest are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestRow {
    /// Base name of the model file, without the `.csv` extension
    pub filename: String,

    /// Display name
    pub name: String,

    /// Query definition the model was trained from
    #[serde(rename = "queryJSON")]
    pub query_json: String,

    /// Model category
    #[serde(rename = "type")]
    pub model_type: String,

    /// Training timestamp, passed through as written
    pub created: String,
}

impl ManifestRow {
    /// File name of the trained model (`<filename>.csv`).
    #[must_use]
    pub fn artifact_file_name(&self) -> String {
        format!("{}.csv", self.filename)
    }

    /// Location of the trained model inside `models_path`.
    #[must_use]
    pub fn artifact_path(&self, models_path: &Path) -> PathBuf {
        models_path.join(self.artifact_file_name())
    }
}

/// Reads every row of the manifest at `path`, in file order.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, a required column
/// (`filename`, `name`, `queryJSON`, `type`, `created`) is missing, or a
/// row cannot be parsed.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRow>, ManifestError> {
    let file = File::open(path).map_err(|source| ManifestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(file)
}

/// Parses manifest rows from any reader.
///
/// # Errors
///
/// Returns an error if a required column is missing or a row cannot be parsed.
pub fn parse_manifest<R: Read>(reader: R) -> Result<Vec<ManifestRow>, ManifestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    reader
        .deserialize()
        .map(|row| row.map_err(ManifestError::from))
        .collect()
}
