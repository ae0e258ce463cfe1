//! Error types for the docflow SDK.

use docflow_core::{ExecutionId, ExecutionStatus, ParseError, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result type for SDK operations.
pub type DocflowResult<T> = Result<T, DocflowError>;

/// Error types that can occur when using the docflow SDK.
#[derive(Debug, thiserror::Error)]
pub enum DocflowError {
    /// The workflow definition could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The workflow definition failed validation; nothing was submitted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network-level failure while talking to the service.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The service rejected the credentials.
    #[error("Authentication failed (status {status}): {message}")]
    Authentication { status: u16, message: String },

    /// The attempt budget ran out while the execution was still running.
    #[error("Polling timed out after {attempts} attempt(s); last status: {}", .last_status.map(|s| s.as_str()).unwrap_or("unknown"))]
    PollTimeout {
        attempts: u32,
        last_status: Option<ExecutionStatus>,
    },

    /// The service reported the execution as failed.
    #[error("Workflow execution{} failed: {error}", .execution_id.map(|id| format!(" {}", id)).unwrap_or_default())]
    RemoteExecution {
        execution_id: Option<ExecutionId>,
        error: serde_json::Value,
    },

    /// Polling was cancelled by the caller.
    #[error("Polling cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The service refused a document submission.
    #[error("Request rejected: {0}")]
    RequestRejected(String),

    /// The service reported that processing a document failed.
    #[error("Processing failed: {message}")]
    ProcessingFailed { message: String },

    /// A local document could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A success response was missing something the client needs.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection timeout.
    #[error("Request timed out")]
    Timeout,

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl DocflowError {
    /// Check if a single request should be retried by the transport.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if a status poll may try again on its next interval.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Timeout
                | Self::RateLimited { .. }
                | Self::Api { .. }
                | Self::Json(_)
        )
    }

    /// Errors that must never be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Create an error from a non-success status code and response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let (message, details) = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse {
                error: Some(error),
                details,
                ..
            }) => (error, details),
            Ok(ErrorResponse {
                detail: Some(detail),
                details,
                ..
            }) => (
                detail
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| detail.to_string()),
                details,
            ),
            _ => (body.to_string(), None),
        };

        match status {
            401 | 403 => Self::Authentication { status, message },
            _ => Self::Api {
                status,
                message,
                details,
            },
        }
    }
}

/// Error response body from the service.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
