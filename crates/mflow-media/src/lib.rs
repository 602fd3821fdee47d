//! External tool runner for media processing.
//!
//! This crate owns the mapping from validated operations to tool argument
//! vectors, spawns the external binaries as supervised child processes
//! with wall-clock timeouts and bounded stderr capture, and provides the
//! scoped per-job workspace.

pub mod command;
pub mod error;
pub mod invocation;
pub mod probe;
pub mod workspace;

pub use command::{ProcessToolRunner, RunnerConfig, ToolRunner};
pub use error::{MediaError, MediaResult};
pub use invocation::{
    build_concat_invocation, build_invocation, build_outro_brand_invocation,
    build_outro_invocation, OutroSpec, Tool, ToolInvocation, WatermarkOverlay,
};
pub use probe::{probe_video, VideoInfo};
pub use workspace::JobWorkspace;
