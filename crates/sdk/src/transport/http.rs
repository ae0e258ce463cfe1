//! HTTP transport layer for the docflow SDK.

use crate::config::ClientConfig;
use crate::error::{DocflowError, DocflowResult};
use reqwest::multipart::Form;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP transport for making API requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    pub fn new(config: Arc<ClientConfig>) -> DocflowResult<Self> {
        let mut headers = header::HeaderMap::new();

        if let Some(ref api_key) = config.api_key {
            let mut value = header::HeaderValue::from_str(api_key)
                .map_err(|_| DocflowError::Config("Invalid API key format".to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::HeaderName::from_static(API_KEY_HEADER), value);
        }

        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&config.user_agent)
                .map_err(|_| DocflowError::Config("Invalid user agent".to_string()))?,
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Build a URL for the given path. Absolute URLs are used as they are.
    fn build_url(&self, path: &str) -> DocflowResult<url::Url> {
        self.config
            .base_url
            .join(path)
            .map_err(DocflowError::InvalidUrl)
    }

    /// Execute a request with retries.
    async fn execute_with_retry(&self, request_builder: RequestBuilder) -> DocflowResult<Response> {
        self.retry_loop(|| {
            request_builder
                .try_clone()
                .ok_or_else(|| DocflowError::Config("Request cannot be cloned".to_string()))
        })
        .await
    }

    /// Send a freshly built request per attempt until it succeeds or stops
    /// being retryable.
    async fn retry_loop<F>(&self, build: F) -> DocflowResult<Response>
    where
        F: Fn() -> DocflowResult<RequestBuilder>,
    {
        let retry_config = &self.config.retry_config;
        let mut attempts = 0;

        loop {
            let request = build()?;

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if response.status().is_success() {
                        return Ok(response);
                    }

                    if attempts < retry_config.max_retries
                        && retry_config.should_retry_status(status)
                    {
                        let backoff = retry_config.backoff_for_attempt(attempts);
                        warn!(
                            status = status,
                            attempt = attempts + 1,
                            backoff_ms = backoff.as_millis(),
                            "Request failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        continue;
                    }

                    return Err(Self::error_from(response).await);
                }
                Err(e) => {
                    let error = DocflowError::from(e);
                    if attempts < retry_config.max_retries && error.is_retryable() {
                        let backoff = retry_config.backoff_for_attempt(attempts);
                        warn!(
                            error = %error,
                            attempt = attempts + 1,
                            backoff_ms = backoff.as_millis(),
                            "Request failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Execute a request exactly once.
    async fn execute_once(&self, request_builder: RequestBuilder) -> DocflowResult<Response> {
        let response = request_builder.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: Response) -> DocflowError {
        let status = response.status().as_u16();
        let retry_after_secs = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        if status == 429 && retry_after_secs.is_some() {
            return DocflowError::RateLimited { retry_after_secs };
        }
        DocflowError::from_response(status, &body)
    }

    /// Execute a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> DocflowResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "GET request");

        let response = self.execute_with_retry(self.client.get(url)).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Execute a single GET request without transport-level retries.
    pub async fn get_once<T: DeserializeOwned>(&self, path: &str) -> DocflowResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "GET request (single attempt)");

        let response = self.execute_once(self.client.get(url)).await?;
        // Decode separately so a malformed body surfaces as a JSON error
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Execute a multipart POST request.
    ///
    /// Multipart bodies cannot be cloned, so `form` builds a new one for every
    /// attempt.
    pub async fn post_multipart<T, F>(&self, path: &str, form: F) -> DocflowResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> DocflowResult<Form>,
    {
        let url = self.build_url(path)?;
        debug!(url = %url, "POST request (multipart)");

        let response = self
            .retry_loop(|| Ok(self.client.post(url.clone()).multipart(form()?)))
            .await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Execute a POST request.
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> DocflowResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "POST request");

        let response = self
            .execute_with_retry(self.client.post(url).json(body))
            .await?;
        let body = response.json().await?;
        Ok(body)
    }
}
