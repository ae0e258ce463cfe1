//! Convert one document to markdown.
//!
//! Run with: DOCFLOW_API_KEY=... cargo run --example convert_document -- invoice.pdf

use docflow_sdk::{ConvertOptions, DocflowClient, DocflowResult, DocumentSource, PollConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> DocflowResult<()> {
    tracing_subscriber::fmt::init();

    let source = match std::env::args().nth(1) {
        Some(arg) if arg.starts_with("http://") || arg.starts_with("https://") => {
            DocumentSource::url(arg)
        }
        Some(arg) => DocumentSource::file(arg),
        None => DocumentSource::url("https://example.com/invoice.pdf"),
    };

    let client = DocflowClient::from_env()?;
    let result = client
        .convert()
        .convert(
            &source,
            &ConvertOptions::default().with_max_pages(10),
            PollConfig::new(300, Duration::from_secs(1)),
        )
        .await?;

    println!("{} page(s)", result.page_count.unwrap_or_default());
    println!("{}", result.markdown.unwrap_or_default());
    Ok(())
}
