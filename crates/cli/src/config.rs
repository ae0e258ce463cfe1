use anyhow::{Context, Result};
use docflow_sdk::{DocflowClient, PollConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub poll: PollSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: f64,

    #[serde(default = "default_progress_every")]
    pub progress_every: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    300
}

fn default_interval_secs() -> f64 {
    1.0
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_interval_secs() -> f64 {
    60.0
}

fn default_progress_every() -> u32 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_interval_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            max_interval_secs: default_max_interval_secs(),
            progress_every: default_progress_every(),
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_polls: Option<u32>,
    pub poll_interval: Option<f64>,
}

impl CliConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")
        } else {
            tracing::info!(
                path = %config_path.display(),
                "Configuration file not found, using defaults"
            );
            Ok(Self::default())
        }
    }

    /// Apply command line values on top of the file.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(api_key) = &overrides.api_key {
            self.api.api_key = Some(api_key.clone());
        }
        if let Some(base_url) = &overrides.base_url {
            self.api.base_url = Some(base_url.clone());
        }
        if let Some(max_polls) = overrides.max_polls {
            self.poll.max_attempts = max_polls;
        }
        if let Some(interval) = overrides.poll_interval {
            self.poll.interval_secs = interval;
        }
    }

    pub fn poll_config(&self) -> Result<PollConfig> {
        let interval = seconds("poll interval", self.poll.interval_secs)?;
        let max_interval = seconds("maximum poll interval", self.poll.max_interval_secs)?;
        anyhow::ensure!(
            self.poll.backoff_multiplier >= 1.0,
            "backoff multiplier must be at least 1.0, got {}",
            self.poll.backoff_multiplier
        );

        Ok(PollConfig::new(self.poll.max_attempts, interval)
            .with_backoff(
                self.poll.backoff_multiplier,
                std::cmp::max(interval, max_interval),
            )
            .with_progress_every(self.poll.progress_every))
    }

    /// Build a client, requiring an API key.
    pub fn client(&self) -> Result<DocflowClient> {
        let api_key = self
            .api
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context(
                "An API key is required: pass --api-key, set DOCFLOW_API_KEY or add api.api_key to the config file",
            )?;

        let mut builder = DocflowClient::builder()
            .api_key(api_key)
            .timeout(Duration::from_secs(self.api.timeout_secs));
        if let Some(base_url) = &self.api.base_url {
            builder = builder.base_url(base_url);
        }

        builder.build().context("Failed to create API client")
    }
}

fn seconds(what: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("Invalid {}: {} seconds", what, value))
}
