//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while running external tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: &'static str },

    #[error("{tool} exited with status {exit_code:?}: {stderr_excerpt}")]
    ToolFailed {
        tool: &'static str,
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: &'static str, secs: u64 },

    #[error("Probe failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("Required asset not found: {0}")]
    MissingAsset(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MediaError {
    pub fn tool_failed(
        tool: &'static str,
        exit_code: Option<i32>,
        stderr_excerpt: impl Into<String>,
    ) -> Self {
        Self::ToolFailed {
            tool,
            exit_code,
            stderr_excerpt: stderr_excerpt.into(),
        }
    }

    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            message: message.into(),
            stderr,
        }
    }
}
