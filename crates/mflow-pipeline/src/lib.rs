//! Job state store and pipeline orchestrator.
//!
//! The orchestrator sequences validation, staging, tool invocation, upload
//! and cleanup for each job, bounded by a shared concurrency limit. The
//! job store is the single writer of job status and enforces the monotonic
//! status ordering.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod store;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, StateError};
pub use orchestrator::Orchestrator;
pub use retry::{retry_if, RetryConfig};
pub use store::JobStore;
