//! Poll an existing execution.
//!
//! Run with: DOCFLOW_API_KEY=... cargo run --example poll_execution -- 42

use docflow_sdk::{CheckHandle, DocflowClient, DocflowError, DocflowResult, ExecutionId, PollConfig};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> DocflowResult<()> {
    tracing_subscriber::fmt::init();

    let execution_id = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u64>().ok())
        .ok_or_else(|| DocflowError::Config("usage: poll_execution <execution-id>".to_string()))?;

    let client = DocflowClient::from_env()?;
    let handle = CheckHandle::for_execution(ExecutionId(execution_id));

    // Ctrl-C stops polling; the execution keeps running remotely
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let config = PollConfig::new(60, Duration::from_secs(1))
        .with_backoff(1.5, Duration::from_secs(15));

    match client.poller(config).with_cancellation(cancel).poll(&handle).await {
        Ok(state) => {
            println!("Execution {} is {}", execution_id, state.status);
            if let Some(error) = &state.error {
                println!("Error: {}", error);
            }
            if let Some(result) = &state.result {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
        }
        Err(DocflowError::PollTimeout { attempts, last_status }) => {
            println!(
                "Gave up after {} attempts (last status: {:?})",
                attempts, last_status
            );
        }
        Err(e) => return Err(e),
    }

    Ok(())
}
