//! Client-side view of a remote workflow execution.

use crate::timestamp;
use crate::types::{ExecutionId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Status of a remote execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Processing,
    Complete,
    Failed,
}

impl ExecutionStatus {
    /// Map one of the remote service's status spellings.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "processing" | "in_progress" | "pending" | "queued" | "running" => {
                Some(Self::Processing)
            }
            "complete" | "completed" | "success" | "succeeded" => Some(Self::Complete),
            "failed" | "failure" | "error" | "cancelled" => Some(Self::Failed),
            _ => None,
        }
    }

    /// No further state change is expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ExecutionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_remote(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown execution status `{}`", raw))
        })
    }
}

/// Execution state as last reported by the remote service.
///
/// `result` is only ever present for `Complete` and `error` only for
/// `Failed`; contradicting fields are dropped while decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawExecutionState")]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl ExecutionState {
    pub fn processing() -> Self {
        Self::with_status(ExecutionStatus::Processing)
    }

    pub fn complete(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::with_status(ExecutionStatus::Complete)
        }
    }

    pub fn failed(error: Value) -> Self {
        Self {
            error: Some(error),
            ..Self::with_status(ExecutionStatus::Failed)
        }
    }

    fn with_status(status: ExecutionStatus) -> Self {
        Self {
            status,
            result: None,
            error: None,
            execution_id: None,
            workflow_id: None,
            created: None,
            updated: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Split a terminal state into its result or its error payload.
    ///
    /// A non-terminal state is returned unchanged as `Err(Pending)`.
    pub fn into_outcome(self) -> Result<Value, ExecutionOutcomeError> {
        match self.status {
            ExecutionStatus::Complete => Ok(self.result.unwrap_or(Value::Null)),
            ExecutionStatus::Failed => Err(ExecutionOutcomeError::Failed {
                execution_id: self.execution_id,
                error: self.error.unwrap_or(Value::Null),
            }),
            ExecutionStatus::Processing => Err(ExecutionOutcomeError::Pending(Box::new(self))),
        }
    }
}

/// Why a state did not yield a result.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcomeError {
    Failed {
        execution_id: Option<ExecutionId>,
        error: Value,
    },
    Pending(Box<ExecutionState>),
}

/// Wire shape of an execution record.
///
/// The payload arrives as `result`, `results` or per-step `steps`; the
/// first non-null one in that order wins.
#[derive(Debug, Deserialize)]
struct RawExecutionState {
    status: ExecutionStatus,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    results: Option<Value>,
    #[serde(default)]
    steps: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default, alias = "id")]
    execution_id: Option<ExecutionId>,
    #[serde(default)]
    workflow_id: Option<WorkflowId>,
    #[serde(
        default,
        alias = "created_at",
        deserialize_with = "timestamp::deserialize_optional"
    )]
    created: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "updated_at",
        deserialize_with = "timestamp::deserialize_optional"
    )]
    updated: Option<DateTime<Utc>>,
}

impl From<RawExecutionState> for ExecutionState {
    fn from(raw: RawExecutionState) -> Self {
        let result = match raw.status {
            ExecutionStatus::Complete => [raw.result, raw.results, raw.steps]
                .into_iter()
                .flatten()
                .find(|v| !v.is_null()),
            _ => None,
        };
        let error = match raw.status {
            ExecutionStatus::Failed => raw.error.filter(|v| !v.is_null()),
            _ => None,
        };

        Self {
            status: raw.status,
            result,
            error,
            execution_id: raw.execution_id,
            workflow_id: raw.workflow_id,
            created: raw.created,
            updated: raw.updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_status_spellings() {
        assert_eq!(
            ExecutionStatus::from_remote("IN_PROGRESS"),
            Some(ExecutionStatus::Processing)
        );
        assert_eq!(
            ExecutionStatus::from_remote("COMPLETED"),
            Some(ExecutionStatus::Complete)
        );
        assert_eq!(
            ExecutionStatus::from_remote("complete"),
            Some(ExecutionStatus::Complete)
        );
        assert_eq!(
            ExecutionStatus::from_remote("FAILED"),
            Some(ExecutionStatus::Failed)
        );
        assert_eq!(ExecutionStatus::from_remote("paused"), None);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!ExecutionStatus::Processing.is_terminal());
        assert!(ExecutionStatus::Complete.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_decode_completed_execution() {
        let state: ExecutionState = serde_json::from_value(json!({
            "id": 7,
            "workflow_id": 3,
            "status": "COMPLETED",
            "steps": {"parse": {"status": "COMPLETED"}},
            "created": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(state.status, ExecutionStatus::Complete);
        assert_eq!(state.execution_id, Some(ExecutionId(7)));
        assert_eq!(state.workflow_id, Some(WorkflowId(3)));
        assert_eq!(state.result.unwrap()["parse"]["status"], "COMPLETED");
        assert!(state.created.is_some());
    }

    #[test]
    fn test_decode_accepts_naive_timestamps() {
        let state: ExecutionState = serde_json::from_value(json!({
            "id": 7,
            "status": "COMPLETED",
            "results": {"parse": {"page_count": 3}},
            "created_at": "2024-01-01T00:00:00.123456",
            "updated_at": "not a date"
        }))
        .unwrap();

        assert_eq!(state.status, ExecutionStatus::Complete);
        assert_eq!(
            state.created,
            timestamp::parse("2024-01-01T00:00:00.123456Z")
        );
        assert!(state.updated.is_none());
        assert_eq!(state.result.unwrap()["parse"]["page_count"], 3);
    }

    #[test]
    fn test_decode_payload_precedence() {
        let state: ExecutionState = serde_json::from_value(json!({
            "status": "COMPLETED",
            "steps": {"from": "steps"},
            "results": {"from": "results"}
        }))
        .unwrap();
        assert_eq!(state.result, Some(json!({"from": "results"})));

        let state: ExecutionState = serde_json::from_value(json!({
            "status": "COMPLETED",
            "steps": {"from": "steps"},
            "results": {"from": "results"},
            "result": {"from": "result"}
        }))
        .unwrap();
        assert_eq!(state.result, Some(json!({"from": "result"})));

        let state: ExecutionState = serde_json::from_value(json!({
            "status": "COMPLETED",
            "result": null,
            "steps": {"from": "steps"}
        }))
        .unwrap();
        assert_eq!(state.result, Some(json!({"from": "steps"})));
    }

    #[test]
    fn test_decode_drops_contradicting_fields() {
        let state: ExecutionState = serde_json::from_value(json!({
            "status": "processing",
            "result": {"partial": true},
            "error": "not yet"
        }))
        .unwrap();

        assert!(state.result.is_none());
        assert!(state.error.is_none());

        let failed: ExecutionState = serde_json::from_value(json!({
            "status": "failed",
            "result": {"partial": true},
            "error": "boom"
        }))
        .unwrap();
        assert!(failed.result.is_none());
        assert_eq!(failed.error, Some(json!("boom")));
    }

    #[test]
    fn test_decode_rejects_unknown_status() {
        let result: Result<ExecutionState, _> =
            serde_json::from_value(json!({"status": "hibernating"}));
        assert!(result.unwrap_err().to_string().contains("hibernating"));
    }

    #[test]
    fn test_into_outcome() {
        assert_eq!(
            ExecutionState::complete(json!({"pages": 2})).into_outcome(),
            Ok(json!({"pages": 2}))
        );

        match ExecutionState::failed(json!("bad input")).into_outcome() {
            Err(ExecutionOutcomeError::Failed { error, .. }) => assert_eq!(error, "bad input"),
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert!(matches!(
            ExecutionState::processing().into_outcome(),
            Err(ExecutionOutcomeError::Pending(_))
        ));
    }
}
