//! Configuration types for the docflow SDK.

use std::time::Duration;
use url::Url;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://www.datalab.to";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DOCFLOW_API_KEY";

/// Environment variable overriding the API host.
pub const BASE_URL_ENV: &str = "DOCFLOW_BASE_URL";

/// Configuration for the docflow client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service.
    pub base_url: Url,
    /// API key sent as `X-Api-Key`.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry configuration for individual requests.
    pub retry_config: RetryConfig,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            user_agent: default_user_agent(),
        }
    }
}

pub(crate) fn default_user_agent() -> String {
    format!("docflow-rust-sdk/{}", env!("CARGO_PKG_VERSION"))
}

/// Configuration for retry behavior of a single request.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// HTTP status codes to retry on.
    pub retry_on_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retry_on_status_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Create a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate backoff duration for a given attempt.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        scaled_backoff(
            self.initial_backoff,
            self.backoff_multiplier,
            attempt,
            self.max_backoff,
        )
    }

    /// Check if a status code should trigger a retry.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status_codes.contains(&status)
    }
}

/// Configuration for polling an execution until it reaches a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Total number of status requests before giving up.
    pub max_attempts: u32,
    /// Wait between the first and second attempt.
    pub interval: Duration,
    /// Growth factor applied to the wait after every attempt. 1.0 keeps it fixed.
    pub backoff_multiplier: f64,
    /// Upper bound for the wait.
    pub max_interval: Duration,
    /// Log progress every this many attempts (0 disables).
    pub progress_every: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 300,
            interval: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_interval: Duration::from_secs(60),
            progress_every: 10,
        }
    }
}

impl PollConfig {
    /// Fixed-interval polling with the given budget.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            max_interval: std::cmp::max(interval, PollConfig::default().max_interval),
            ..Default::default()
        }
    }

    /// A single status check.
    pub fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    pub fn with_progress_every(mut self, attempts: u32) -> Self {
        self.progress_every = attempts;
        self
    }

    /// Wait after the given zero-based attempt.
    pub fn interval_after(&self, attempt: u32) -> Duration {
        scaled_backoff(
            self.interval,
            self.backoff_multiplier,
            attempt,
            self.max_interval,
        )
    }

    /// Upper bound of the total wait, ignoring request latency.
    pub fn total_wait(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.interval_after(attempt))
            .sum()
    }
}

fn scaled_backoff(initial: Duration, multiplier: f64, attempt: u32, max: Duration) -> Duration {
    let backoff_ms = initial.as_millis() as f64 * multiplier.powi(attempt as i32);
    let backoff = Duration::from_millis(backoff_ms as u64);
    std::cmp::min(backoff, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let config = RetryConfig::default();

        // First attempt: 100ms
        assert_eq!(config.backoff_for_attempt(0), Duration::from_millis(100));
        // Second attempt: 200ms
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(200));
        // Third attempt: 400ms
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let config = RetryConfig {
            max_backoff: Duration::from_millis(500),
            ..Default::default()
        };

        assert_eq!(config.backoff_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_should_retry_status() {
        let config = RetryConfig::default();

        assert!(config.should_retry_status(429));
        assert!(config.should_retry_status(503));
        assert!(!config.should_retry_status(401));
        assert!(!config.should_retry_status(404));
    }

    #[test]
    fn test_client_config_defaults() {
        let url = Url::parse("https://example.com").unwrap();
        let config = ClientConfig::new(url.clone());

        assert_eq!(config.base_url, url);
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("docflow-rust-sdk/"));
    }

    #[test]
    fn test_poll_config_fixed_interval() {
        let config = PollConfig::new(5, Duration::from_secs(2));

        assert_eq!(config.interval_after(0), Duration::from_secs(2));
        assert_eq!(config.interval_after(3), Duration::from_secs(2));
        assert_eq!(config.total_wait(), Duration::from_secs(8));
    }

    #[test]
    fn test_poll_config_backoff_capped() {
        let config = PollConfig::new(10, Duration::from_secs(1))
            .with_backoff(2.0, Duration::from_secs(5));

        assert_eq!(config.interval_after(0), Duration::from_secs(1));
        assert_eq!(config.interval_after(1), Duration::from_secs(2));
        assert_eq!(config.interval_after(2), Duration::from_secs(4));
        assert_eq!(config.interval_after(3), Duration::from_secs(5));
    }

    #[test]
    fn test_poll_config_single() {
        let config = PollConfig::single();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.total_wait(), Duration::ZERO);
    }
}
