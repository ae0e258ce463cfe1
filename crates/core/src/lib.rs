// Core types for docflow workflow definitions

pub mod error;
pub mod execution;
pub mod timestamp;
pub mod types;
pub mod workflow;

pub use error::{ParseError, ValidationError, ValidationIssue};
pub use execution::{ExecutionOutcomeError, ExecutionState, ExecutionStatus};
pub use types::*;
pub use workflow::DependencyGraph;
