//! Uploads trained pathogen models to the model store API.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use model_uploader::{DEFAULT_API_URL, ModelStoreClient, UploadSettings, read_manifest, run};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

/// Uploads trained pathogen models to production
#[derive(Parser)]
#[command(name = "upload-models")]
#[command(version)]
struct Cli {
    /// Where the modelDB.tsv produced during training is stored
    #[arg(long, default_value = "test_model_store/modelDB.tsv")]
    db_file: PathBuf,

    /// Directory holding the trained `<filename>.csv` model files
    #[arg(long, default_value = "test_model_store")]
    model_store: PathBuf,

    /// Keep processing the remaining models when one fails
    #[arg(long)]
    continue_on_error: bool,

    /// URL of the model store `/pathogen_models` endpoint
    #[arg(long, env = "MODEL_STORE_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// API key allowing uploads
    #[arg(long, env = "MODEL_STORE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli)?;

    if cli.api_key.is_none() {
        warn!("No API key given, uploads are sent without an Authorization header");
    }

    let rows = read_manifest(&cli.db_file)
        .with_context(|| format!("Failed to read manifest {}", cli.db_file.display()))?;
    info!("Loaded {} models from {}", rows.len(), cli.db_file.display());

    let client = ModelStoreClient::new(&cli.api_url, cli.api_key.clone(), &UploadSettings::default())
        .context("Failed to create HTTP client")?;

    let summary = run(&client, &rows, &cli.model_store, cli.continue_on_error)
        .await
        .context("Upload aborted")?;

    info!(
        "Finished {} of {} models: {} uploaded, {} failed, {} skipped",
        summary.total(),
        rows.len(),
        summary.succeeded,
        summary.failed,
        summary.skipped
    );

    Ok(())
}

/// Initializes logging with console and optional file output.
fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stdout);

    // File layer
    let file_layer = match &cli.log_file {
        Some(path) => {
            let log_file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(log_file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_file_supplies_api_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "MODEL_STORE_API_URL=http://models.internal:5000/pathogen_models\n",
        )
        .unwrap();

        dotenvy::from_path(&path).unwrap();
        let cli = Cli::try_parse_from(["upload-models"]).unwrap();

        assert_eq!(cli.api_url, "http://models.internal:5000/pathogen_models");
        assert!(!cli.continue_on_error);
    }
}
