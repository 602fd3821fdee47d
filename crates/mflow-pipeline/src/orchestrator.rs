//! Pipeline orchestrator.
//!
//! Sequences one job's stages (staging, processing, uploading) and
//! coordinates concurrent jobs under a shared execution bound. Exactly one
//! task owns a job from submission to its terminal status.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

use mflow_media::{JobWorkspace, MediaError, ToolRunner};
use mflow_models::{FailureDetail, FailureKind, Job, JobId, JobStatus, Operation, Stage};
use mflow_storage::{ArtifactStore, StorageError};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::retry::{retry_if, RetryConfig};
use crate::store::JobStore;

/// Shared context handed to each job's execution task.
struct JobContext {
    config: PipelineConfig,
    store: Arc<JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    runner: Arc<dyn ToolRunner>,
}

/// Accepts job submissions and drives each job to a terminal status.
pub struct Orchestrator {
    ctx: Arc<JobContext>,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        artifacts: Arc<dyn ArtifactStore>,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);

        Self {
            ctx: Arc::new(JobContext {
                config,
                store: Arc::new(JobStore::new()),
                artifacts,
                runner,
            }),
            permits,
            shutdown,
        }
    }

    /// Validate and accept a job, scheduling asynchronous execution.
    ///
    /// Unsupported operation/parameter combinations are rejected here,
    /// before any job record exists. Returns as soon as the job is
    /// recorded; processing happens in the background.
    pub async fn submit(&self, operation: Operation, input_ref: String) -> PipelineResult<JobId> {
        if *self.shutdown.borrow() {
            return Err(PipelineError::ShuttingDown);
        }

        operation.validate(&input_ref)?;

        let job = self.ctx.store.create(operation, input_ref).await;
        let job_id = job.id.clone();

        let ctx = Arc::clone(&self.ctx);
        let permits = Arc::clone(&self.permits);
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            // Wait for an execution slot; the job stays Pending meanwhile
            let permit = tokio::select! {
                permit = permits.acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => {
                        fail_quietly(&ctx.store, &job.id, shutdown_detail()).await;
                        return;
                    }
                },
                _ = shutdown_rx.changed() => {
                    fail_quietly(&ctx.store, &job.id, shutdown_detail()).await;
                    return;
                }
            };
            let _permit = permit;

            // The deadline covers staging through upload
            match tokio::time::timeout(ctx.config.job_timeout, run_stages(&ctx, &job)).await {
                Ok(Ok(())) => {}
                Ok(Err(detail)) => {
                    fail_quietly(&ctx.store, &job.id, detail).await;
                }
                Err(_) => {
                    let stage = current_stage(&ctx.store, &job.id).await;
                    let detail = FailureDetail::new(
                        stage,
                        FailureKind::JobTimeout,
                        format!(
                            "job exceeded the {}s overall deadline",
                            ctx.config.job_timeout.as_secs()
                        ),
                    );
                    fail_quietly(&ctx.store, &job.id, detail).await;
                }
            }
        });

        Ok(job_id)
    }

    /// Read a job's current committed state.
    pub async fn status(&self, id: &JobId) -> PipelineResult<Job> {
        Ok(self.ctx.store.get(id).await?)
    }

    /// Stop accepting work and fail everything still in flight, so no job
    /// is left ambiguously non-terminal.
    pub async fn shutdown(&self) {
        // send_replace sets the flag even when no job task is subscribed,
        // so an idle shutdown still refuses later submissions
        self.shutdown.send_replace(true);
        self.permits.close();
        self.ctx.store.fail_inflight(shutdown_detail()).await;
    }
}

/// Run the staged pipeline for one job. The workspace is dropped on every
/// exit path, including timeout cancellation of this future.
async fn run_stages(ctx: &JobContext, job: &Job) -> Result<(), FailureDetail> {
    let output_key = output_key(&ctx.config.output_prefix, &job.input_ref, &job.operation);

    if ctx.config.reuse_outputs {
        // Best effort: a probe failure here never fails the job
        match ctx.artifacts.exists(&output_key).await {
            Ok(true) => {
                debug!(job_id = %job.id, key = %output_key, "Reusing existing output");
                return finish_reused(ctx, &job.id, output_key).await;
            }
            Ok(false) => {}
            Err(e) => warn!(job_id = %job.id, "Output reuse check failed: {}", e),
        }
    }

    advance(ctx, &job.id, JobStatus::Staging).await?;

    let workspace = JobWorkspace::create(&ctx.config.work_dir)
        .map_err(|e| FailureDetail::new(Stage::Staging, FailureKind::Internal, e.to_string()))?;

    let input_ext = input_extension(&job.input_ref);
    let input_path = workspace.input_path(&input_ext);
    let fetch_retry = RetryConfig::new("artifact_fetch").with_max_retries(ctx.config.store_retries);
    retry_if(
        &fetch_retry,
        || ctx.artifacts.fetch(&job.input_ref, &input_path),
        StorageError::is_retryable,
    )
    .await
    .map_err(|e| storage_detail(Stage::Staging, e))?;

    advance(ctx, &job.id, JobStatus::Processing).await?;

    let output_path = workspace.output_path(&job.operation.output_extension(&job.input_ref));
    ctx.runner
        .run(&job.operation, &input_path, &output_path)
        .await
        .map_err(media_detail)?;

    advance(ctx, &job.id, JobStatus::Uploading).await?;

    let store_retry = RetryConfig::new("artifact_store").with_max_retries(ctx.config.store_retries);
    retry_if(
        &store_retry,
        || ctx.artifacts.store(&output_path, &output_key),
        StorageError::is_retryable,
    )
    .await
    .map_err(|e| storage_detail(Stage::Uploading, e))?;

    ctx.store
        .complete(&job.id, output_key)
        .await
        .map_err(|e| FailureDetail::new(Stage::Uploading, FailureKind::Internal, e.to_string()))?;

    Ok(())
}

/// Commit the remaining transitions for a job whose output already exists,
/// keeping the observed status sequence a prefix of the full path.
async fn finish_reused(
    ctx: &JobContext,
    id: &JobId,
    output_key: String,
) -> Result<(), FailureDetail> {
    for status in [JobStatus::Staging, JobStatus::Processing, JobStatus::Uploading] {
        advance(ctx, id, status).await?;
    }
    ctx.store
        .complete(id, output_key)
        .await
        .map_err(|e| FailureDetail::new(Stage::Uploading, FailureKind::Internal, e.to_string()))?;
    Ok(())
}

async fn advance(ctx: &JobContext, id: &JobId, next: JobStatus) -> Result<(), FailureDetail> {
    ctx.store
        .advance(id, next)
        .await
        .map(|_| ())
        .map_err(|e| FailureDetail::new(stage_of(next), FailureKind::Internal, e.to_string()))
}

/// Record a failure unless the job already reached a terminal status
/// (e.g. the shutdown drain got there first).
async fn fail_quietly(store: &JobStore, id: &JobId, detail: FailureDetail) {
    if let Ok(job) = store.get(id).await {
        if job.is_terminal() {
            return;
        }
    }
    if let Err(e) = store.fail(id, detail).await {
        debug!(job_id = %id, "Failure already recorded: {}", e);
    }
}

async fn current_stage(store: &JobStore, id: &JobId) -> Stage {
    match store.get(id).await {
        Ok(job) => match job.status {
            JobStatus::Staging => Stage::Staging,
            JobStatus::Processing => Stage::Processing,
            JobStatus::Uploading => Stage::Uploading,
            _ => Stage::Submit,
        },
        Err(_) => Stage::Submit,
    }
}

fn stage_of(status: JobStatus) -> Stage {
    match status {
        JobStatus::Staging => Stage::Staging,
        JobStatus::Processing => Stage::Processing,
        JobStatus::Uploading | JobStatus::Succeeded => Stage::Uploading,
        _ => Stage::Submit,
    }
}

fn storage_detail(stage: Stage, err: StorageError) -> FailureDetail {
    let kind = match err {
        StorageError::NotFound(_) => FailureKind::NotFound,
        StorageError::AccessDenied(_) => FailureKind::AccessDenied,
        StorageError::Transient(_) | StorageError::Io(_) => FailureKind::Transient,
        _ => FailureKind::Internal,
    };
    FailureDetail::new(stage, kind, err.to_string())
}

fn media_detail(err: MediaError) -> FailureDetail {
    let kind = match err {
        MediaError::ToolNotFound { .. } => FailureKind::ToolNotFound,
        MediaError::Timeout { .. } => FailureKind::ToolTimeout,
        MediaError::ToolFailed { .. }
        | MediaError::ProbeFailed { .. }
        | MediaError::InvalidMedia(_) => FailureKind::ToolExecution,
        _ => FailureKind::Internal,
    };
    FailureDetail::new(Stage::Processing, kind, err.to_string())
}

fn shutdown_detail() -> FailureDetail {
    FailureDetail::new(
        Stage::Submit,
        FailureKind::Shutdown,
        "service shut down before the job finished",
    )
}

/// Deterministic output key: hash of the input reference plus the
/// operation kind and target extension. Re-submissions of the same work
/// land on the same key, which keeps upload retries and the reuse check
/// idempotent.
fn output_key(prefix: &str, input_ref: &str, operation: &Operation) -> String {
    let digest = Sha256::digest(input_ref.as_bytes());
    let hash = hex_prefix(&digest, 16);
    // Outro-appended watermarks get their own key so plain watermarks of
    // the same input never alias them
    let label = match operation {
        Operation::Watermark(p) if p.append_outro => "watermark_outro".to_string(),
        _ => operation.kind().to_string(),
    };
    format!(
        "{}/{}_{}.{}",
        prefix,
        hash,
        label,
        operation.output_extension(input_ref)
    )
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut s = String::with_capacity(chars);
    for b in bytes {
        if s.len() >= chars {
            break;
        }
        s.push_str(&format!("{:02x}", b));
    }
    s.truncate(chars);
    s
}

fn input_extension(input_ref: &str) -> String {
    std::path::Path::new(input_ref)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mflow_models::{
        ImageConvertParams, ImageFormat, TranscodeParams, VideoContainer, WatermarkParams,
    };

    #[test]
    fn output_key_is_deterministic_and_kind_scoped() {
        let transcode = Operation::Transcode(TranscodeParams {
            container: VideoContainer::Mp4,
            resolution: None,
            preset: Default::default(),
        });
        let convert = Operation::ImageConvert(ImageConvertParams {
            format: ImageFormat::Png,
            width: None,
            height: None,
            quality: None,
        });

        let a = output_key("processed", "in/video.mov", &transcode);
        let b = output_key("processed", "in/video.mov", &transcode);
        assert_eq!(a, b);
        assert!(a.starts_with("processed/"));
        assert!(a.ends_with("_transcode.mp4"));

        let c = output_key("processed", "in/photo.png", &convert);
        assert_ne!(a, c);
        assert!(c.ends_with("_image_convert.png"));
    }

    #[test]
    fn outro_watermark_keys_never_alias_plain_watermarks() {
        let plain = Operation::Watermark(WatermarkParams {
            position: Default::default(),
            opacity: 0.5,
            scale_percent: 10,
            preset: Default::default(),
            append_outro: false,
        });
        let with_outro = Operation::Watermark(WatermarkParams {
            append_outro: true,
            ..match plain.clone() {
                Operation::Watermark(p) => p,
                _ => unreachable!(),
            }
        });

        let a = output_key("processed", "in/video.mp4", &plain);
        let b = output_key("processed", "in/video.mp4", &with_outro);
        assert_ne!(a, b);
        assert!(b.ends_with("_watermark_outro.mp4"));
    }
}
