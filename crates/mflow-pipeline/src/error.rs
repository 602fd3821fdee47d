//! Pipeline error types.

use thiserror::Error;

use mflow_models::operation::OperationError;
use mflow_models::{JobId, JobStatus};

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// State store contract violations.
///
/// `InvalidTransition` indicates an orchestrator bug, never an expected
/// runtime condition: the record is left unchanged and the caller should
/// treat it as fatal locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] OperationError),

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("service is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    State(StateError),
}

impl From<StateError> for PipelineError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(id) => PipelineError::NotFound(id),
            other => PipelineError::State(other),
        }
    }
}
