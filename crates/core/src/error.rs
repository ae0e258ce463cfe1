//! Error types for loading and validating workflow definitions.

use std::path::PathBuf;

/// Failure to read a workflow definition into the data model.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The definition is not a JSON object.
    #[error("workflow definition must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// A required top-level field is absent.
    #[error("workflow definition is missing required field `{field}`")]
    MissingField { field: &'static str },

    /// A top-level field has the wrong shape.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// A step object could not be turned into a step descriptor.
    #[error("step #{index} is invalid: {reason}")]
    InvalidStep { index: usize, reason: String },

    /// The input text is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The definition file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One problem found while validating a definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    /// A required identifier was empty.
    #[error("`{field}` must not be empty")]
    EmptyField { field: &'static str },

    /// Two steps share a `unique_name`.
    #[error("duplicate step name `{name}` (steps #{first_index} and #{duplicate_index})")]
    DuplicateName {
        name: String,
        first_index: usize,
        duplicate_index: usize,
    },

    /// A step depends on a name that no step carries.
    #[error("step `{step}` depends on `{missing}`, which is not defined")]
    DanglingDependency { step: String, missing: String },

    /// The dependency relation loops back on itself. Members are listed in
    /// traversal order.
    #[error("circular dependency: {}", closed_loop(.cycle))]
    CyclicDependency { cycle: Vec<String> },
}

fn closed_loop(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

/// Aggregate of every issue found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("workflow validation failed with {} issue(s){}", .issues.len(), bullet_list(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn bullet_list(issues: &[ValidationIssue]) -> String {
    issues.iter().map(|issue| format!("\n  - {}", issue)).collect()
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub(crate) fn single(issue: ValidationIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    /// Duplicate-name issues as `(name, first_index, duplicate_index)`.
    pub fn duplicate_names(&self) -> impl Iterator<Item = (&str, usize, usize)> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::DuplicateName {
                name,
                first_index,
                duplicate_index,
            } => Some((name.as_str(), *first_index, *duplicate_index)),
            _ => None,
        })
    }

    /// Dangling references as `(step, missing)`.
    pub fn dangling_dependencies(&self) -> impl Iterator<Item = (&str, &str)> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::DanglingDependency { step, missing } => {
                Some((step.as_str(), missing.as_str()))
            }
            _ => None,
        })
    }

    /// Member lists of every reported cycle.
    pub fn cycles(&self) -> impl Iterator<Item = &[String]> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::CyclicDependency { cycle } => Some(cycle.as_slice()),
            _ => None,
        })
    }
}
