//! Rate-limited HTTP client for the model store API.

use core::num::NonZeroU32;
use core::time::Duration;
use std::path::Path;

use backon::Retryable;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::error::UploadError;
use crate::config::{RetryPolicy, UploadSettings};
use crate::manifest::ManifestRow;

type RateLimiterType = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate-limited client for the `/pathogen_models` endpoint.
///
/// The rate limiter is owned by the client, so every upload made through
/// one client shares the same window.
pub struct ModelStoreClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    limiter: RateLimiterType,
    retry: RetryPolicy,
}

impl ModelStoreClient {
    /// Creates a new client with rate limiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        settings: &UploadSettings,
    ) -> Result<Self, UploadError> {
        let client = Client::builder().timeout(settings.timeout).build()?;

        // No burst: attempts start evenly spaced, so any one-second window
        // holds at most `requests_per_second` starts.
        let quota = Quota::per_second(settings.requests_per_second).allow_burst(NonZeroU32::MIN);

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            limiter: RateLimiter::direct(quota),
            retry: settings.retry,
        })
    }

    /// Waits for the rate limiter before starting an attempt.
    async fn wait_for_rate_limit(&self) {
        self.limiter.until_ready().await;
    }

    /// Uploads one manifest row with its model file.
    ///
    /// Attempts that the server rejects with 429 are retried with exponential
    /// backoff, up to the configured attempt ceiling. Every attempt waits for
    /// the shared rate limiter first.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::MissingArtifact`] if the model file does not
    /// exist, [`UploadError::RateLimited`] once the attempts are exhausted,
    /// and [`UploadError::Rejected`] for any other non-201 response.
    pub async fn upload_model(&self, row: &ManifestRow, models_path: &Path) -> Result<(), UploadError> {
        let artifact_path = row.artifact_path(models_path);
        let data = match tokio::fs::read(&artifact_path).await {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::MissingArtifact {
                    path: artifact_path,
                });
            }
            Err(source) => {
                return Err(UploadError::ReadArtifact {
                    path: artifact_path,
                    source,
                });
            }
        };

        let client = self;
        let data = data.as_slice();

        (|| async move {
            client.wait_for_rate_limit().await;
            client.post_model(row, data).await
        })
        .retry(self.retry.backoff())
        .when(UploadError::is_rate_limited)
        .notify(|error: &UploadError, delay: Duration| {
            warn!(
                filename = %row.filename,
                "Retrying in {delay:?} after: {error}"
            );
        })
        .await
    }

    /// Sends a single multipart POST for `row`.
    async fn post_model(&self, row: &ManifestRow, data: &[u8]) -> Result<(), UploadError> {
        debug!(filename = %row.filename, url = %self.api_url, "Uploading model");

        let model_part = Part::bytes(data.to_vec())
            .file_name(row.artifact_file_name())
            .mime_str("text/plain")?;

        let form = Form::new()
            .text("id", row.filename.clone())
            .text("name", row.name.clone())
            .text("query_str", row.query_json.clone())
            .text("model_type", row.model_type.clone())
            .text("created", row.created.clone())
            .part("model", model_part);

        let mut request = self.client.post(&self.api_url).multipart(form);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::CREATED {
            info!(filename = %row.filename, bytes = data.len(), "Uploaded model");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();

        // Only retry on 429 Too Many Requests
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(filename = %row.filename, "Rate limited (429), will retry");
            return Err(UploadError::RateLimited { body });
        }

        Err(UploadError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
