//! Workflows API endpoints.

use crate::client::DocflowClient;
use crate::config::PollConfig;
use crate::error::{DocflowError, DocflowResult};
use chrono::{DateTime, Utc};
use docflow_core::{
    timestamp, CheckHandle, ExecutionOutcomeError, ExecutionState, StepDescriptor,
    WorkflowDefinition, WorkflowId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

const WORKFLOWS_PATH: &str = "/api/v1/workflows/workflows";
const STEP_TYPES_PATH: &str = "/api/v1/workflows/step-types";

/// Workflows API for defining and running document workflows.
pub struct WorkflowsApi<'a> {
    client: &'a DocflowClient,
}

impl<'a> WorkflowsApi<'a> {
    pub(crate) fn new(client: &'a DocflowClient) -> Self {
        Self { client }
    }

    /// Validate a definition and register it with the service.
    ///
    /// Nothing is sent when validation fails.
    pub async fn create(&self, definition: &WorkflowDefinition) -> DocflowResult<Workflow> {
        let graph = definition.validate()?;
        debug!(
            workflow = %definition.name,
            steps = graph.len(),
            layers = graph.layers().len(),
            "Submitting workflow definition"
        );

        let workflow: Workflow = self.client.http.post(WORKFLOWS_PATH, definition).await?;
        info!(workflow_id = %workflow.id, name = %workflow.name, "Workflow created");
        Ok(workflow)
    }

    /// Get a workflow by ID.
    pub async fn get(&self, id: WorkflowId) -> DocflowResult<Workflow> {
        self.client
            .http
            .get(&format!("{}/{}", WORKFLOWS_PATH, id))
            .await
    }

    /// List workflows visible to the API key.
    pub async fn list(&self) -> DocflowResult<Vec<Workflow>> {
        let response: ListWorkflowsResponse = self.client.http.get(WORKFLOWS_PATH).await?;
        Ok(response.workflows)
    }

    /// Start an execution of a registered workflow.
    ///
    /// The returned state carries the execution ID; pass it to
    /// [`WorkflowsApi::check_handle`] to get something to poll.
    pub async fn execute(&self, id: WorkflowId, input: &InputConfig) -> DocflowResult<ExecutionState> {
        input.validate()?;

        let request = ExecuteWorkflowRequest {
            input_config: input,
        };
        let state: ExecutionState = self
            .client
            .http
            .post(&format!("{}/{}/execute", WORKFLOWS_PATH, id), &request)
            .await?;

        info!(
            workflow_id = %id,
            execution_id = ?state.execution_id,
            status = %state.status,
            "Workflow execution started"
        );
        Ok(state)
    }

    /// Handle for polling the execution described by `state`.
    pub fn check_handle(state: &ExecutionState) -> DocflowResult<CheckHandle> {
        state
            .execution_id
            .map(CheckHandle::for_execution)
            .ok_or_else(|| {
                DocflowError::UnexpectedResponse("execution response carried no id".to_string())
            })
    }

    /// Fetch the current state once, without retries.
    pub async fn status(&self, handle: &CheckHandle) -> DocflowResult<ExecutionState> {
        self.client.http.get_once(handle.as_str()).await
    }

    /// List the step types the service can run.
    pub async fn step_types(&self) -> DocflowResult<Vec<StepType>> {
        let response: StepTypesResponse = self.client.http.get(STEP_TYPES_PATH).await?;
        Ok(response.step_types)
    }

    /// Poll an execution until it completes, fails or the budget runs out.
    pub async fn poll(&self, handle: &CheckHandle, config: PollConfig) -> DocflowResult<ExecutionState> {
        self.client.poller(config).poll(handle).await
    }

    /// Validate, create, execute and poll; returns the execution result.
    ///
    /// A failed execution becomes [`DocflowError::RemoteExecution`].
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        input: &InputConfig,
        config: PollConfig,
    ) -> DocflowResult<Value> {
        input.validate()?;
        let workflow = self.create(definition).await?;
        let started = self.execute(workflow.id, input).await?;

        let state = if started.is_terminal() {
            started
        } else {
            let handle = Self::check_handle(&started)?;
            self.poll(&handle, config.clone()).await?
        };

        state.into_outcome().map_err(|outcome| match outcome {
            ExecutionOutcomeError::Failed {
                execution_id,
                error,
            } => DocflowError::RemoteExecution {
                execution_id,
                error,
            },
            ExecutionOutcomeError::Pending(state) => DocflowError::PollTimeout {
                attempts: config.max_attempts,
                last_status: Some(state.status),
            },
        })
    }
}

/// A workflow registered with the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<u64>,
    #[serde(default)]
    pub steps: Vec<StepDescriptor>,
    #[serde(
        default,
        alias = "created_at",
        deserialize_with = "timestamp::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "updated_at",
        deserialize_with = "timestamp::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<DateTime<Utc>>,
}

/// Documents an execution should process.
///
/// Either explicit file URLs or a bucket to enumerate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// `s3` or `r2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
}

impl InputConfig {
    pub fn from_file_urls(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            file_urls: urls.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn from_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_storage_type(mut self, storage_type: impl Into<String>) -> Self {
        self.storage_type = Some(storage_type.into());
        self
    }

    pub fn validate(&self) -> DocflowResult<()> {
        let has_bucket = self
            .bucket
            .as_deref()
            .map(|b| !b.trim().is_empty())
            .unwrap_or(false);

        if self.file_urls.is_empty() && !has_bucket {
            return Err(DocflowError::Config(
                "input needs at least one file URL or a bucket".to_string(),
            ));
        }
        if self.file_urls.iter().any(|u| u.trim().is_empty()) {
            return Err(DocflowError::Config("file URLs must not be empty".to_string()));
        }
        Ok(())
    }
}

/// A step type offered by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepType {
    #[serde(rename = "type", alias = "step_key")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ExecuteWorkflowRequest<'a> {
    input_config: &'a InputConfig,
}

#[derive(Debug, Deserialize)]
struct ListWorkflowsResponse {
    workflows: Vec<Workflow>,
}

#[derive(Debug, Deserialize)]
struct StepTypesResponse {
    step_types: Vec<StepType>,
}
