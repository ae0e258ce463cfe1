//! Single-document conversion and OCR endpoints.
//!
//! Both take one document, hand back a `request_check_url` and are then
//! polled until the service reports `complete` or a failure.

use crate::client::DocflowClient;
use crate::config::PollConfig;
use crate::error::{DocflowError, DocflowResult};
use crate::poller::{Poller, StatusSource};
use async_trait::async_trait;
use docflow_core::{CheckHandle, ExecutionOutcomeError, ExecutionState, ExecutionStatus};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

const CONVERT_PATH: &str = "/api/v1/marker";
const OCR_PATH: &str = "/api/v1/ocr";

const OUTPUT_FORMATS: [&str; 4] = ["markdown", "html", "json", "chunks"];
const MODES: [&str; 3] = ["fast", "balanced", "accurate"];

/// Where the document to process comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Local file, uploaded with the request.
    File(PathBuf),
    /// URL the service downloads the document from.
    Url(String),
}

impl DocumentSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    async fn load(&self) -> DocflowResult<LoadedDocument> {
        match self {
            Self::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| DocflowError::File {
                        path: path.clone(),
                        source,
                    })?;
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string());
                let mime = mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .to_string();

                debug!(file = %path.display(), mime = %mime, size = bytes.len(), "Loaded document");
                Ok(LoadedDocument::File {
                    bytes,
                    file_name,
                    mime,
                })
            }
            Self::Url(url) if url.trim().is_empty() => Err(DocflowError::Config(
                "document URL must not be empty".to_string(),
            )),
            Self::Url(url) => Ok(LoadedDocument::Url(url.clone())),
        }
    }
}

enum LoadedDocument {
    File {
        bytes: Vec<u8>,
        file_name: String,
        mime: String,
    },
    Url(String),
}

impl LoadedDocument {
    fn form(&self, fields: &[(&'static str, String)]) -> DocflowResult<Form> {
        let form = fields
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(*name, value.clone()));

        let form = match self {
            Self::File {
                bytes,
                file_name,
                mime,
            } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)?;
                form.part("file", part)
            }
            Self::Url(url) => form.text("file_url", url.clone()),
        };
        Ok(form)
    }
}

/// Page selection shared by conversion and OCR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageOptions {
    pub max_pages: Option<u32>,
    /// e.g. `0-2` or `0,1,2`.
    pub page_range: Option<String>,
    pub skip_cache: bool,
}

impl PageOptions {
    fn push_fields(&self, fields: &mut Vec<(&'static str, String)>) {
        if let Some(max_pages) = self.max_pages {
            fields.push(("max_pages", max_pages.to_string()));
        }
        if let Some(page_range) = &self.page_range {
            fields.push(("page_range", page_range.clone()));
        }
        fields.push(("skip_cache", self.skip_cache.to_string()));
    }
}

/// Options for converting a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    #[serde(flatten)]
    pub pages: PageOptions,
    pub force_ocr: bool,
    pub format_lines: bool,
    pub paginate: bool,
    pub use_llm: bool,
    pub strip_existing_ocr: bool,
    pub disable_image_extraction: bool,
    pub block_correction_prompt: Option<String>,
    pub additional_config: Option<Value>,
    /// JSON schema for structured extraction.
    pub page_schema: Option<Value>,
    /// `markdown`, `html`, `json` or `chunks`.
    pub output_format: String,
    /// `fast`, `balanced` or `accurate`.
    pub mode: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            pages: PageOptions::default(),
            force_ocr: false,
            format_lines: false,
            paginate: false,
            use_llm: false,
            strip_existing_ocr: false,
            disable_image_extraction: false,
            block_correction_prompt: None,
            additional_config: None,
            page_schema: None,
            output_format: "markdown".to_string(),
            mode: "fast".to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = output_format.into();
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.pages.max_pages = Some(max_pages);
        self
    }

    pub fn with_page_schema(mut self, schema: Value) -> Self {
        self.page_schema = Some(schema);
        self
    }

    pub fn validate(&self) -> DocflowResult<()> {
        if !OUTPUT_FORMATS.contains(&self.output_format.as_str()) {
            return Err(DocflowError::Config(format!(
                "output format must be one of {}, got `{}`",
                OUTPUT_FORMATS.join(", "),
                self.output_format
            )));
        }
        if !MODES.contains(&self.mode.as_str()) {
            return Err(DocflowError::Config(format!(
                "mode must be one of {}, got `{}`",
                MODES.join(", "),
                self.mode
            )));
        }
        Ok(())
    }

    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        self.pages.push_fields(&mut fields);

        for (name, flag) in [
            ("force_ocr", self.force_ocr),
            ("format_lines", self.format_lines),
            ("paginate", self.paginate),
            ("use_llm", self.use_llm),
            ("strip_existing_ocr", self.strip_existing_ocr),
            ("disable_image_extraction", self.disable_image_extraction),
        ] {
            fields.push((name, flag.to_string()));
        }

        if let Some(prompt) = &self.block_correction_prompt {
            fields.push(("block_correction_prompt", prompt.clone()));
        }
        if let Some(config) = &self.additional_config {
            fields.push(("additional_config", config.to_string()));
        }
        if let Some(schema) = &self.page_schema {
            fields.push(("page_schema", schema.to_string()));
        }
        fields.push(("output_format", self.output_format.clone()));
        fields.push(("mode", self.mode.clone()));
        fields
    }
}

/// Options for OCR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOptions {
    #[serde(flatten)]
    pub pages: PageOptions,
}

impl OcrOptions {
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        self.pages.push_fields(&mut fields);
        fields
    }
}

fn complete_status() -> ExecutionStatus {
    ExecutionStatus::Complete
}

/// Output of a finished conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub output_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_schema_json: Option<String>,
    /// Extracted images as base64, keyed by file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default = "complete_status")]
    pub status: ExecutionStatus,
}

/// Output of a finished OCR request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub pages: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default = "complete_status")]
    pub status: ExecutionStatus,
}

impl OcrResult {
    /// Text of every page, pages separated by a blank line.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(page_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Text of the page whose `page` field equals `page`.
    pub fn page_text(&self, page: u64) -> Option<String> {
        self.pages
            .iter()
            .find(|p| p.get("page").and_then(Value::as_u64) == Some(page))
            .map(page_text)
    }
}

fn page_text(page: &Value) -> String {
    page.get("text_lines")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| line.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    request_check_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Maps a check response onto an execution state.
///
/// `complete` carries the whole body as the result. An unsuccessful body
/// that is not still processing is a failure.
fn check_state(body: Value) -> ExecutionState {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .and_then(ExecutionStatus::from_remote);
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(true);

    match status {
        Some(ExecutionStatus::Complete) => ExecutionState::complete(body),
        Some(ExecutionStatus::Processing) => ExecutionState::processing(),
        Some(ExecutionStatus::Failed) => ExecutionState::failed(error_of(&body)),
        None if !success => ExecutionState::failed(error_of(&body)),
        None => ExecutionState::processing(),
    }
}

fn error_of(body: &Value) -> Value {
    match body.get("error") {
        Some(Value::String(error)) if !error.is_empty() => Value::String(error.clone()),
        Some(error) if !error.is_null() && !error.is_string() => error.clone(),
        _ => Value::String("Unknown error".to_string()),
    }
}

/// Polls a `request_check_url` through the client's transport.
struct CheckUrlSource<'a> {
    client: &'a DocflowClient,
}

#[async_trait]
impl StatusSource for CheckUrlSource<'_> {
    async fn fetch_status(&self, handle: &CheckHandle) -> DocflowResult<ExecutionState> {
        let body: Value = self.client.http.get_once(handle.as_str()).await?;
        Ok(check_state(body))
    }
}

async fn submit(
    client: &DocflowClient,
    path: &str,
    source: &DocumentSource,
    fields: Vec<(&'static str, String)>,
) -> DocflowResult<CheckHandle> {
    let document = source.load().await?;
    let response: SubmitResponse = client
        .http
        .post_multipart(path, || document.form(&fields))
        .await?;

    if !response.success {
        return Err(DocflowError::RequestRejected(
            response
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }

    let check_url = response
        .request_check_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            DocflowError::UnexpectedResponse("submission carried no request_check_url".to_string())
        })?;

    info!(request_id = ?response.request_id, endpoint = path, "Document submitted");
    Ok(CheckHandle::new(check_url))
}

async fn wait(client: &DocflowClient, handle: &CheckHandle, config: PollConfig) -> DocflowResult<Value> {
    let source = CheckUrlSource { client };
    let max_attempts = config.max_attempts;
    let state = Poller::new(&source, config).poll(handle).await?;

    state.into_outcome().map_err(|outcome| match outcome {
        ExecutionOutcomeError::Failed { error, .. } => DocflowError::ProcessingFailed {
            message: error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        },
        ExecutionOutcomeError::Pending(state) => DocflowError::PollTimeout {
            attempts: max_attempts,
            last_status: Some(state.status),
        },
    })
}

/// Conversion to markdown, HTML, JSON or chunks.
pub struct ConvertApi<'a> {
    client: &'a DocflowClient,
}

impl<'a> ConvertApi<'a> {
    pub(crate) fn new(client: &'a DocflowClient) -> Self {
        Self { client }
    }

    /// Submit a document and return the handle to poll.
    pub async fn submit(
        &self,
        source: &DocumentSource,
        options: &ConvertOptions,
    ) -> DocflowResult<CheckHandle> {
        options.validate()?;
        submit(self.client, CONVERT_PATH, source, options.form_fields()).await
    }

    /// Poll a submitted conversion until it finishes.
    pub async fn wait(&self, handle: &CheckHandle, config: PollConfig) -> DocflowResult<ConversionResult> {
        let body = wait(self.client, handle, config).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Submit and wait. A result without `output_format` gets the requested one.
    pub async fn convert(
        &self,
        source: &DocumentSource,
        options: &ConvertOptions,
        config: PollConfig,
    ) -> DocflowResult<ConversionResult> {
        let handle = self.submit(source, options).await?;
        let mut result = self.wait(&handle, config).await?;
        if result.output_format.is_empty() {
            result.output_format = options.output_format.clone();
        }
        Ok(result)
    }
}

/// Optical character recognition.
pub struct OcrApi<'a> {
    client: &'a DocflowClient,
}

impl<'a> OcrApi<'a> {
    pub(crate) fn new(client: &'a DocflowClient) -> Self {
        Self { client }
    }

    /// Submit a document and return the handle to poll.
    pub async fn submit(&self, source: &DocumentSource, options: &OcrOptions) -> DocflowResult<CheckHandle> {
        submit(self.client, OCR_PATH, source, options.form_fields()).await
    }

    pub async fn wait(&self, handle: &CheckHandle, config: PollConfig) -> DocflowResult<OcrResult> {
        let body = wait(self.client, handle, config).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Submit and wait.
    pub async fn ocr(
        &self,
        source: &DocumentSource,
        options: &OcrOptions,
        config: PollConfig,
    ) -> DocflowResult<OcrResult> {
        let handle = self.submit(source, options).await?;
        self.wait(&handle, config).await
    }
}
