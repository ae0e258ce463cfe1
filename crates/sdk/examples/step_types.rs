//! List the step types the service offers.
//!
//! Run with: DOCFLOW_API_KEY=... cargo run --example step_types

use docflow_sdk::{DocflowClient, DocflowResult};

#[tokio::main]
async fn main() -> DocflowResult<()> {
    tracing_subscriber::fmt::init();

    let client = DocflowClient::from_env()?;
    let step_types = client.workflows().step_types().await?;

    println!("Found {} step types", step_types.len());
    for step_type in &step_types {
        println!(
            "  {} {}",
            step_type.step_type,
            step_type.version.as_deref().unwrap_or("")
        );
        if let Some(description) = &step_type.description {
            println!("      {}", description);
        }
    }

    Ok(())
}
