//! In-memory job state store.
//!
//! The store owns the canonical job records and is the single writer of
//! durable status. Every mutation commits under the write lock, so a
//! status query always observes the most recently committed transition.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info};

use mflow_models::{FailureDetail, Job, JobId, JobStatus, Operation};

use crate::error::StateError;

/// Canonical job records, keyed by job identity.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new pending job.
    pub async fn create(&self, operation: Operation, input_ref: impl Into<String>) -> Job {
        let job = Job::new(operation, input_ref);
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        info!(job_id = %job.id, operation = %job.operation.kind(), "Job created");
        job
    }

    /// Read a job's current committed state.
    pub async fn get(&self, id: &JobId) -> Result<Job, StateError> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(id.clone()))
    }

    /// Advance a job one step along the linear pipeline.
    ///
    /// Rejects regressions, skips and transitions out of terminal states
    /// with `InvalidTransition`, leaving the record unchanged.
    pub async fn advance(&self, id: &JobId, next: JobStatus) -> Result<Job, StateError> {
        self.mutate(id, next, |job| {
            job.status = next;
        })
        .await
    }

    /// Mark a job succeeded with its result reference.
    pub async fn complete(&self, id: &JobId, result_ref: impl Into<String>) -> Result<Job, StateError> {
        let result_ref = result_ref.into();
        let job = self
            .mutate(id, JobStatus::Succeeded, move |job| {
                job.status = JobStatus::Succeeded;
                job.result_ref = Some(result_ref);
            })
            .await?;
        info!(job_id = %id, result_ref = ?job.result_ref, "Job succeeded");
        Ok(job)
    }

    /// Mark a job failed with its failure detail.
    pub async fn fail(&self, id: &JobId, detail: FailureDetail) -> Result<Job, StateError> {
        let job = self
            .mutate(id, JobStatus::Failed, move |job| {
                job.status = JobStatus::Failed;
                job.failure = Some(detail);
            })
            .await?;
        info!(job_id = %id, failure = ?job.failure, "Job failed");
        Ok(job)
    }

    /// Fail every non-terminal job; used when draining at shutdown so no
    /// job is left ambiguously in flight. Returns the number failed.
    pub async fn fail_inflight(&self, detail: FailureDetail) -> usize {
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();
        let mut failed = 0;
        for job in jobs.values_mut() {
            if !job.is_terminal() {
                job.status = JobStatus::Failed;
                job.failure = Some(detail.clone());
                job.updated_at = now;
                failed += 1;
            }
        }
        if failed > 0 {
            info!("Marked {} in-flight jobs failed during shutdown", failed);
        }
        failed
    }

    async fn mutate<F>(&self, id: &JobId, next: JobStatus, apply: F) -> Result<Job, StateError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(id.clone()))?;

        if !job.status.can_transition_to(next) {
            let err = StateError::InvalidTransition {
                job_id: id.clone(),
                from: job.status,
                to: next,
            };
            error!(job_id = %id, "{}", err);
            return Err(err);
        }

        apply(job);
        job.updated_at = Utc::now();
        debug_assert!(job.check_invariants());
        Ok(job.clone())
    }
}
