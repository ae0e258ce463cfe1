//! # Docflow SDK
//!
//! Rust client for defining, submitting and monitoring document workflows on
//! a hosted workflow service.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docflow_sdk::{DocflowClient, DocflowResult, InputConfig, PollConfig, WorkflowDefinition};
//!
//! #[tokio::main]
//! async fn main() -> DocflowResult<()> {
//!     // Build client
//!     let client = DocflowClient::builder()
//!         .api_key("sk-your-api-key")
//!         .build()?;
//!
//!     // Validate, submit and wait for a two-step workflow
//!     let definition = WorkflowDefinition::builtin_simple()?;
//!     let input = InputConfig::from_file_urls(["https://example.com/invoice.pdf"]);
//!     let result = client
//!         .workflows()
//!         .run(&definition, &input, PollConfig::default())
//!         .await?;
//!
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Converting a single document
//!
//! ```rust,no_run
//! use docflow_sdk::{ConvertOptions, DocflowClient, DocumentSource, PollConfig};
//!
//! # async fn example() -> docflow_sdk::DocflowResult<()> {
//! let client = DocflowClient::from_env()?;
//! let result = client
//!     .convert()
//!     .convert(
//!         &DocumentSource::file("invoice.pdf"),
//!         &ConvertOptions::default(),
//!         PollConfig::default(),
//!     )
//!     .await?;
//! println!("{}", result.markdown.unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! ## Checking a definition locally
//!
//! ```rust
//! use docflow_sdk::WorkflowDefinition;
//!
//! let definition = WorkflowDefinition::builtin_simple().unwrap();
//! let graph = definition.validate().unwrap();
//! assert_eq!(graph.layers(), vec![vec!["parse_document"], vec!["extract_metadata"]]);
//! println!("{}", graph);
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod transport;

// Re-export main client
pub use api::{
    ConversionResult, ConvertApi, ConvertOptions, DocumentSource, InputConfig, OcrApi, OcrOptions,
    OcrResult, PageOptions, StepType, Workflow, WorkflowsApi,
};
pub use client::{DocflowClient, DocflowClientBuilder};
pub use config::{ClientConfig, PollConfig, RetryConfig};
pub use error::{DocflowError, DocflowResult};
pub use poller::{Poller, StatusSource};

// Re-export core types for convenience
pub use docflow_core::{
    CheckHandle, DependencyGraph, ExecutionId, ExecutionState, ExecutionStatus, ParseError,
    Settings, StepDescriptor, ValidationError, ValidationIssue, WorkflowDefinition, WorkflowId,
};
