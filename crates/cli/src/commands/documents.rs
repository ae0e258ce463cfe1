// Single-document conversion and OCR

use crate::output;
use anyhow::{Context, Result};
use docflow_sdk::{
    ConversionResult, ConvertOptions, DocflowClient, DocumentSource, OcrOptions, OcrResult,
    PollConfig,
};
use std::path::{Path, PathBuf};

/// URLs are sent for the service to fetch; anything else is a local file.
pub fn source(document: &str) -> DocumentSource {
    if document.starts_with("http://") || document.starts_with("https://") {
        DocumentSource::url(document)
    } else {
        DocumentSource::file(document)
    }
}

pub async fn convert(
    client: &DocflowClient,
    source: &DocumentSource,
    options: &ConvertOptions,
    poll: PollConfig,
    save: Option<&Path>,
) -> Result<ConversionResult> {
    let result = client
        .convert()
        .convert(source, options, poll)
        .await
        .context("Failed to convert document")?;

    match save {
        Some(path) if result.success => report_saved(output::save_conversion(path, &result)?),
        Some(_) => tracing::warn!(error = ?result.error, "Conversion reported no success, nothing saved"),
        None => print_conversion(&result),
    }
    Ok(result)
}

pub async fn ocr(
    client: &DocflowClient,
    source: &DocumentSource,
    options: &OcrOptions,
    poll: PollConfig,
    save: Option<&Path>,
) -> Result<OcrResult> {
    let result = client
        .ocr()
        .ocr(source, options, poll)
        .await
        .context("Failed to run OCR")?;

    match save {
        Some(path) if result.success => report_saved(output::save_ocr(path, &result)?),
        Some(_) => tracing::warn!(error = ?result.error, "OCR reported no success, nothing saved"),
        None => println!("{}", result.text()),
    }
    Ok(result)
}

fn print_conversion(result: &ConversionResult) {
    if let Some(markdown) = &result.markdown {
        println!("{}", markdown);
    } else if let Some(html) = &result.html {
        println!("{}", html);
    } else if let Some(value) = result.json.as_ref().or(result.chunks.as_ref()) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        );
    } else {
        println!("No content returned");
    }
}

fn report_saved(paths: Vec<PathBuf>) {
    for path in paths {
        println!("Saved {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_sdk::{DocflowError, RetryConfig};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DocflowClient {
        DocflowClient::builder()
            .base_url(server.uri())
            .api_key("sk-test")
            .retry_config(RetryConfig::no_retry())
            .build()
            .unwrap()
    }

    #[test]
    fn test_source_detection() {
        assert_eq!(
            source("https://files.example.com/a.pdf"),
            DocumentSource::Url("https://files.example.com/a.pdf".to_string())
        );
        assert_eq!(
            source("scans/a.pdf"),
            DocumentSource::File(PathBuf::from("scans/a.pdf"))
        );
    }

    #[tokio::test]
    async fn test_convert_saves_markdown() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/marker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "request_id": "req-3",
                "request_check_url": format!("{}/api/v1/marker/req-3", server.uri())
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/marker/req-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "status": "complete",
                "output_format": "markdown",
                "markdown": "# Report"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = convert(
            &client(&server),
            &source("https://files.example.com/report.pdf"),
            &ConvertOptions::default(),
            PollConfig::new(3, Duration::ZERO),
            Some(&dir.path().join("report")),
        )
        .await
        .unwrap();

        assert!(result.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("report.md")).unwrap(),
            "# Report"
        );
    }

    #[tokio::test]
    async fn test_ocr_failure_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/ocr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "request_check_url": "/api/v1/ocr/req-4"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/ocr/req-4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "status": "failed",
                "error": "Page limit exceeded"
            })))
            .mount(&server)
            .await;

        let err = ocr(
            &client(&server),
            &source("https://files.example.com/scan.png"),
            &OcrOptions::default(),
            PollConfig::new(3, Duration::ZERO),
            None,
        )
        .await
        .unwrap_err();

        assert!(format!("{:#}", err).contains("Page limit exceeded"));
        assert!(matches!(
            err.downcast_ref::<DocflowError>(),
            Some(DocflowError::ProcessingFailed { .. })
        ));
    }
}
