//! End-to-end workflow example.
//!
//! Validates the built-in parse-then-extract workflow, submits it, runs it on
//! one document and waits for the result.
//!
//! Run with: DOCFLOW_API_KEY=... cargo run --example run_workflow -- https://example.com/doc.pdf

use docflow_sdk::{DocflowClient, DocflowResult, InputConfig, PollConfig, WorkflowDefinition};
use std::time::Duration;

#[tokio::main]
async fn main() -> DocflowResult<()> {
    tracing_subscriber::fmt::init();

    let file_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com/invoice.pdf".to_string());

    let client = DocflowClient::from_env()?;

    let definition = WorkflowDefinition::builtin_simple()?;

    let graph = definition.validate()?;
    println!("Submitting \"{}\":\n{}", definition.name, graph);

    let poll = PollConfig::new(120, Duration::from_secs(2)).with_progress_every(15);
    let result = client
        .workflows()
        .run(&definition, &InputConfig::from_file_urls([file_url]), poll)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
