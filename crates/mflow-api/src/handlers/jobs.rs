//! Job submission and status handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use mflow_models::{FailureDetail, Job, JobId, JobStatus, Operation, OperationKind};

use crate::error::ApiResult;
use crate::state::AppState;

/// Job submission request body.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    /// Operation and its parameters (tagged)
    #[serde(flatten)]
    pub operation: Operation,
    /// Remote key of the source artifact
    pub input_ref: String,
}

/// Job submission response.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
}

/// Job status response.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub operation: OperationKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            operation: job.operation.kind(),
            status: job.status,
            result_ref: job.result_ref,
            error: job.failure,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// POST /jobs
///
/// Accept a job for asynchronous processing. Returns 202 with the
/// assigned job identity; processing happens in the background.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    info!(
        operation = %request.operation.kind(),
        input_ref = %request.input_ref,
        "Job submission"
    );

    let job_id = state
        .orchestrator
        .submit(request.operation, request.input_ref)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job_id.to_string(),
        }),
    ))
}

/// GET /jobs/:job_id
///
/// Current committed state of a job, or 404 if unknown.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = state
        .orchestrator
        .status(&JobId::from_string(job_id))
        .await?;

    Ok(Json(job.into()))
}
