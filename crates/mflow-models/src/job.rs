//! Job records and status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::operation::Operation;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job status.
///
/// Transitions are monotonic along
/// `Pending -> Staging -> Processing -> Uploading -> Succeeded`,
/// with `Failed` reachable from any non-terminal status. A job never
/// leaves a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for an execution slot
    #[default]
    Pending,
    /// Fetching the input artifact into the local workspace
    Staging,
    /// External tool is running
    Processing,
    /// Storing the output artifact
    Uploading,
    /// Output stored, result reference recorded
    Succeeded,
    /// Terminal failure, failure detail recorded
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Staging => "staging",
            JobStatus::Processing => "processing",
            JobStatus::Uploading => "uploading",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    /// Position along the linear pipeline; used to enforce monotonicity.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Staging => 1,
            JobStatus::Processing => 2,
            JobStatus::Uploading => 3,
            JobStatus::Succeeded => 4,
            JobStatus::Failed => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether a transition to `next` is legal.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Failed => true,
            JobStatus::Pending => false,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submit,
    Staging,
    Processing,
    Uploading,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Submit => "submit",
            Stage::Staging => "staging",
            Stage::Processing => "processing",
            Stage::Uploading => "uploading",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input artifact or job not found
    NotFound,
    /// Retryable infrastructure failure, retries exhausted
    Transient,
    /// Permission failure, never retried
    AccessDenied,
    /// Tool ran and reported failure (non-zero exit)
    ToolExecution,
    /// Tool exceeded its wall-clock limit and was killed
    ToolTimeout,
    /// Tool binary absent from the environment
    ToolNotFound,
    /// Overall job deadline exceeded
    JobTimeout,
    /// Job was in flight when the process shut down
    Shutdown,
    /// Unexpected internal error
    Internal,
}

/// Structured failure detail recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Stage that failed
    pub stage: Stage,
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable cause
    pub message: String,
}

impl FailureDetail {
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

/// One unit of media processing work and its tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Requested operation with validated parameters
    pub operation: Operation,

    /// Remote key of the source artifact
    pub input_ref: String,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Remote key of the output artifact; set iff status is Succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,

    /// Failure detail; set iff status is Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(operation: Operation, input_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            operation,
            input_ref: input_ref.into(),
            status: JobStatus::Pending,
            result_ref: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Verify the result/failure fields agree with the status.
    pub fn check_invariants(&self) -> bool {
        (self.result_ref.is_some() == (self.status == JobStatus::Succeeded))
            && (self.failure.is_some() == (self.status == JobStatus::Failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{ImageConvertParams, ImageFormat};

    fn sample_op() -> Operation {
        Operation::ImageConvert(ImageConvertParams {
            format: ImageFormat::Png,
            width: None,
            height: None,
            quality: None,
        })
    }

    #[test]
    fn status_order_is_monotonic() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Staging));
        assert!(Staging.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Uploading));
        assert!(Uploading.can_transition_to(Succeeded));

        // No regressions or skips
        assert!(!Staging.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Staging));
        assert!(!Pending.can_transition_to(Succeeded));
    }

    #[test]
    fn failed_reachable_from_any_non_terminal() {
        use JobStatus::*;
        for status in [Pending, Staging, Processing, Uploading] {
            assert!(status.can_transition_to(Failed));
        }
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn terminal_statuses_are_final() {
        use JobStatus::*;
        for next in [Pending, Staging, Processing, Uploading, Succeeded, Failed] {
            assert!(!Succeeded.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn new_job_is_pending_and_consistent() {
        let job = Job::new(sample_op(), "incoming/test.png");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.result_ref.is_none());
        assert!(job.failure.is_none());
        assert!(job.check_invariants());
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Staging).unwrap(),
            "\"staging\""
        );
        assert_eq!(
            serde_json::to_string(&FailureKind::ToolTimeout).unwrap(),
            "\"tool_timeout\""
        );
    }
}
