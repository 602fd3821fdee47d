//! Shared domain types for the media processing pipeline.
//!
//! This crate defines:
//! - Job records and their status lifecycle
//! - The closed set of supported processing operations
//! - Failure classification attached to failed jobs

pub mod job;
pub mod operation;

pub use job::{FailureDetail, FailureKind, Job, JobId, JobStatus, Stage};
pub use operation::{
    EncodePreset, ImageConvertParams, ImageFormat, Operation, OperationKind, Resolution,
    TranscodeParams, VideoContainer, WatermarkParams, WatermarkPosition,
};
