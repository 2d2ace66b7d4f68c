//! Rate limit and retry settings for the uploader.

use core::num::NonZeroU32;
use core::time::Duration;

use backon::ExponentialBuilder;

/// Default model store endpoint.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/pathogen_models";

/// Rate limit: 2 upload attempts per second
pub const RATE_LIMIT_PER_SECOND: NonZeroU32 = match NonZeroU32::new(2) {
    Some(rate) => rate,
    None => panic!("rate limit must be non-zero"),
};

/// Total attempts per model, including the first one.
pub const MAX_ATTEMPTS: usize = 8;

/// Exponential backoff applied when the server answers 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff schedule for this policy.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.max_attempts.saturating_sub(1))
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
    }
}

/// Settings shared by every upload in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    /// Upload attempts allowed to start per second.
    pub requests_per_second: NonZeroU32,
    pub retry: RetryPolicy,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            requests_per_second: RATE_LIMIT_PER_SECOND,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = UploadSettings::default();
        assert_eq!(settings.requests_per_second.get(), 2);
        assert_eq!(settings.retry.max_attempts, 8);
        assert_eq!(settings.retry.min_delay, Duration::from_secs(1));
    }
}
