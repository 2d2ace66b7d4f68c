//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use thiserror::Error;
use tracing::debug;

/// Default directory for uploaded model artifacts.
pub const DEFAULT_MODEL_STORE_PATH: &str = "./model_store";

/// Default listen address for the model store API.
pub const DEFAULT_BIND_ADDRESS: ([u8; 4], u16) = ([127, 0, 0, 1], 5000);

/// Default size of the database connection pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default request body limit (64 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("failed to create model store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open object store: {0}")]
    ObjectStore(#[from] object_store::Error),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL. `None` selects the in-memory repository.
    pub database_url: Option<String>,

    /// Connection pool size when a database is configured
    pub database_max_connections: u32,

    /// Directory where model artifacts are stored
    pub model_store_path: PathBuf,

    /// Address the API listens on
    pub bind_address: SocketAddr,

    /// Shared bearer key required on mutating requests, if set
    pub api_key: Option<String>,

    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `DATABASE_URL`: `PostgreSQL` connection string
    /// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 5)
    /// - `MODEL_STORE_PATH`: artifact directory (default: `./model_store`)
    /// - `BIND_ADDRESS`: listen address (default: `127.0.0.1:5000`)
    /// - `MODEL_STORE_API_KEY`: bearer key for uploads, updates and deletes
    /// - `MAX_UPLOAD_BYTES`: request body limit (default: 64 MiB)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bind_address = parse_var("BIND_ADDRESS", var("BIND_ADDRESS"))?
            .unwrap_or_else(|| SocketAddr::from(DEFAULT_BIND_ADDRESS));
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"))?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let database_max_connections =
            parse_var("DATABASE_MAX_CONNECTIONS", var("DATABASE_MAX_CONNECTIONS"))?
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS);
        if database_max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                name: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url: var("DATABASE_URL"),
            database_max_connections,
            model_store_path: var("MODEL_STORE_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_MODEL_STORE_PATH), PathBuf::from),
            bind_address,
            api_key: var("MODEL_STORE_API_KEY"),
            max_upload_bytes,
        })
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|value| {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}

/// Opens the artifact object store rooted at `base_path`, creating the directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or opened.
pub fn open_object_store(base_path: &Path) -> Result<Arc<dyn ObjectStore>, ConfigError> {
    std::fs::create_dir_all(base_path).map_err(|source| ConfigError::CreateDir {
        path: base_path.to_path_buf(),
        source,
    })?;

    debug!(path = %base_path.display(), "Opening model object store");

    Ok(Arc::new(LocalFileSystem::new_with_prefix(base_path)?))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.api_key.is_none());
        assert_eq!(config.model_store_path, PathBuf::from(DEFAULT_MODEL_STORE_PATH));
        assert_eq!(config.bind_address.port(), 5000);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.database_max_connections, DEFAULT_DATABASE_MAX_CONNECTIONS);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/models"),
            ("MODEL_STORE_PATH", "/tmp/models"),
            ("BIND_ADDRESS", "0.0.0.0:8080"),
            ("MODEL_STORE_API_KEY", "secret"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/models")
        );
        assert_eq!(config.model_store_path, PathBuf::from("/tmp/models"));
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.database_max_connections, 12);
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let err =
            Config::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "DATABASE_MAX_CONNECTIONS",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", ""), ("MODEL_STORE_API_KEY", "  ")]))
                .unwrap();
        assert!(config.database_url.is_none());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_bind_address() {
        let err = Config::from_lookup(lookup(&[("BIND_ADDRESS", "nowhere")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "BIND_ADDRESS",
                ..
            }
        ));
    }

    #[test]
    fn test_open_object_store_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store");
        open_object_store(&path).unwrap();
        assert!(path.is_dir());
    }
}
