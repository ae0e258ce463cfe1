//! Main client for the docflow SDK.

use crate::api::{ConvertApi, OcrApi, WorkflowsApi};
use crate::config::{default_user_agent, ClientConfig, PollConfig, RetryConfig, API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL};
use crate::error::{DocflowError, DocflowResult};
use crate::poller::{Poller, StatusSource};
use crate::transport::HttpTransport;
use async_trait::async_trait;
use docflow_core::{CheckHandle, ExecutionState};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Main client for interacting with the workflow service.
#[derive(Debug, Clone)]
pub struct DocflowClient {
    config: Arc<ClientConfig>,
    pub(crate) http: HttpTransport,
}

impl DocflowClient {
    /// Create a new client builder.
    pub fn builder() -> DocflowClientBuilder {
        DocflowClientBuilder::new()
    }

    /// Build a client from `DOCFLOW_API_KEY` and `DOCFLOW_BASE_URL`.
    pub fn from_env() -> DocflowResult<Self> {
        let mut builder = Self::builder();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            builder = builder.base_url(url);
        }
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            DocflowError::Config(format!("{} is not set", API_KEY_ENV))
        })?;
        builder.api_key(api_key).build()
    }

    /// Create a client from configuration.
    fn from_config(config: ClientConfig) -> DocflowResult<Self> {
        let config = Arc::new(config);
        let http = HttpTransport::new(config.clone())?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the workflows API.
    pub fn workflows(&self) -> WorkflowsApi<'_> {
        WorkflowsApi::new(self)
    }

    /// Get the document conversion API.
    pub fn convert(&self) -> ConvertApi<'_> {
        ConvertApi::new(self)
    }

    /// Get the OCR API.
    pub fn ocr(&self) -> OcrApi<'_> {
        OcrApi::new(self)
    }

    /// Poller that checks execution status through this client.
    pub fn poller(&self, config: PollConfig) -> Poller<'_, Self> {
        Poller::new(self, config)
    }
}

#[async_trait]
impl StatusSource for DocflowClient {
    async fn fetch_status(&self, handle: &CheckHandle) -> DocflowResult<ExecutionState> {
        self.workflows().status(handle).await
    }
}

/// Builder for creating a DocflowClient.
pub struct DocflowClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
    retry_config: RetryConfig,
    user_agent: Option<String>,
}

impl DocflowClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            user_agent: None,
        }
    }

    /// Set the base URL of the service. Defaults to the hosted API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the API key for authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> DocflowResult<DocflowClient> {
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        let base_url = Url::parse(base_url)?;

        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let config = ClientConfig {
            base_url,
            api_key,
            timeout: self.timeout,
            retry_config: self.retry_config,
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
        };

        DocflowClient::from_config(config)
    }
}

impl Default for DocflowClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
