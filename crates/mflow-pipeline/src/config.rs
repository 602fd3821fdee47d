//! Pipeline configuration.

use std::time::Duration;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum simultaneously executing jobs
    pub max_concurrent_jobs: usize,
    /// Overall deadline for one job's staging through upload
    pub job_timeout: Duration,
    /// Root directory for per-job workspaces
    pub work_dir: String,
    /// Key prefix for output artifacts
    pub output_prefix: String,
    /// Retry attempts for storage operations
    pub store_retries: u32,
    /// Short-circuit to Succeeded when the output key already exists
    pub reuse_outputs: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(900),
            work_dir: "/tmp/mflow".to_string(),
            output_prefix: "processed".to_string(),
            store_retries: 3,
            reuse_outputs: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("MFLOW_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            job_timeout: Duration::from_secs(
                std::env::var("MFLOW_JOB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            work_dir: std::env::var("MFLOW_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/mflow".to_string()),
            output_prefix: std::env::var("MFLOW_OUTPUT_PREFIX")
                .unwrap_or_else(|_| "processed".to_string()),
            store_retries: std::env::var("MFLOW_STORE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            reuse_outputs: std::env::var("MFLOW_REUSE_OUTPUTS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}
