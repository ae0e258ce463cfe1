use crate::error::{ValidationError, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque per-step configuration, passed to the remote service untouched.
pub type Settings = Map<String, Value>;

/// Identifier the remote service assigns to a stored workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub u64);

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier the remote service assigns to one execution of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub u64);

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference used to poll an execution's status.
///
/// Either a path relative to the service base URL or an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckHandle(pub String);

impl CheckHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Standard status path for an execution id.
    pub fn for_execution(id: ExecutionId) -> Self {
        Self(format!("/api/v1/workflows/executions/{}", id.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CheckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single named unit of remote work within a workflow definition.
///
/// Only built through [`StepDescriptor::new`] or deserialization, so the
/// identifiers are always non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct StepDescriptor {
    step_key: String,
    unique_name: String,
    settings: Settings,
    depends_on: Vec<String>,
}

impl StepDescriptor {
    /// Create a step, rejecting empty identifiers.
    ///
    /// Repeated `depends_on` entries are collapsed, keeping first-seen order.
    pub fn new(
        step_key: impl Into<String>,
        unique_name: impl Into<String>,
        settings: Settings,
        depends_on: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ValidationError> {
        let step_key = step_key.into();
        let unique_name = unique_name.into();

        let mut issues = Vec::new();
        if unique_name.trim().is_empty() {
            issues.push(ValidationIssue::EmptyField {
                field: "unique_name",
            });
        }
        if step_key.trim().is_empty() {
            issues.push(ValidationIssue::EmptyField { field: "step_key" });
        }
        if !issues.is_empty() {
            return Err(ValidationError::new(issues));
        }

        let mut deps: Vec<String> = Vec::new();
        for dep in depends_on {
            let dep = dep.into();
            if dep.trim().is_empty() {
                return Err(ValidationError::single(ValidationIssue::EmptyField {
                    field: "depends_on",
                }));
            }
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        Ok(Self {
            step_key,
            unique_name,
            settings,
            depends_on: deps,
        })
    }

    /// Step with no settings and no dependencies.
    pub fn simple(
        step_key: impl Into<String>,
        unique_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(step_key, unique_name, Settings::new(), Vec::<String>::new())
    }

    /// Remote step type, e.g. `marker_parse`.
    pub fn step_key(&self) -> &str {
        &self.step_key
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Names of the steps that must finish first, without repeats.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Same step with its settings swapped out.
    pub(crate) fn with_settings(&self, settings: Settings) -> Self {
        Self {
            settings,
            step_key: self.step_key.clone(),
            unique_name: self.unique_name.clone(),
            depends_on: self.depends_on.clone(),
        }
    }

    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

/// Wire shape of a step before its identifiers are checked.
#[derive(Debug, Deserialize)]
struct RawStep {
    step_key: String,
    unique_name: String,
    #[serde(default)]
    settings: Option<Settings>,
    #[serde(default)]
    depends_on: Option<Vec<String>>,
}

impl TryFrom<RawStep> for StepDescriptor {
    type Error = ValidationError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        StepDescriptor::new(
            raw.step_key,
            raw.unique_name,
            raw.settings.unwrap_or_default(),
            raw.depends_on.unwrap_or_default(),
        )
    }
}

/// A named, ordered collection of steps with dependency edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepDescriptor>,
}
