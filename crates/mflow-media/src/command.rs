//! Child-process supervision for external tools.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use mflow_models::Operation;

use crate::error::{MediaError, MediaResult};
use crate::invocation::{
    build_concat_invocation, build_invocation, build_outro_brand_invocation,
    build_outro_invocation, OutroSpec, Tool, ToolInvocation, WatermarkOverlay,
};
use crate::probe::{probe_video, VideoInfo};

/// Maximum stderr bytes kept for diagnostics.
const STDERR_EXCERPT_LIMIT: usize = 4096;

/// Runs a validated operation against a staged input file.
///
/// Implementations write exactly one output file to the caller-specified
/// path and never mutate the input.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, operation: &Operation, input: &Path, output: &Path) -> MediaResult<()>;
}

/// Configuration for the process-backed runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Wall-clock limit per tool invocation
    pub tool_timeout: Duration,
    /// Server-side watermark asset (PNG with transparency)
    pub watermark_asset: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(600),
            watermark_asset: PathBuf::from("/app/assets/watermark.png"),
        }
    }
}

impl RunnerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            tool_timeout: Duration::from_secs(
                std::env::var("MFLOW_TOOL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            watermark_asset: std::env::var("MFLOW_WATERMARK_ASSET")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/app/assets/watermark.png")),
        }
    }
}

/// Tool runner backed by real child processes.
pub struct ProcessToolRunner {
    config: RunnerConfig,
}

impl ProcessToolRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Verify that every binary a deployment needs is on PATH.
    pub fn check_tools() -> MediaResult<()> {
        for tool in [Tool::Ffmpeg, Tool::Ffprobe, Tool::Convert] {
            which::which(tool.program()).map_err(|_| MediaError::ToolNotFound {
                tool: tool.program(),
            })?;
        }
        Ok(())
    }

    /// Resolve overlay inputs for a watermark run: the configured asset
    /// plus an overlay height scaled from the probed video height.
    async fn watermark_overlay(
        &self,
        input: &Path,
        scale_percent: u8,
    ) -> MediaResult<(VideoInfo, WatermarkOverlay)> {
        if !self.config.watermark_asset.exists() {
            return Err(MediaError::MissingAsset(self.config.watermark_asset.clone()));
        }

        let info = probe_video(input).await?;
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::InvalidMedia(
                "probed video dimensions are zero".to_string(),
            ));
        }
        let overlay_height = (info.height * scale_percent as u32 / 100).max(1);

        let overlay = WatermarkOverlay {
            asset: self.config.watermark_asset.clone(),
            overlay_height,
        };
        Ok((info, overlay))
    }

    /// Watermark the input, then render a branded outro clip matching the
    /// source dimensions and concatenate it after the video. Intermediates
    /// live beside the output, inside the job workspace.
    async fn run_watermark_with_outro(
        &self,
        operation: &Operation,
        info: &VideoInfo,
        overlay: &WatermarkOverlay,
        input: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        let preset = match operation {
            Operation::Watermark(p) => p.preset,
            _ => unreachable!("outro applies only to watermark runs"),
        };
        let scratch = output.parent().unwrap_or_else(|| Path::new("."));
        let ext = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let marked = scratch.join(format!("marked.{}", ext));
        let outro = scratch.join("outro.mp4");
        let branded = scratch.join("outro_branded.mp4");

        let inv = build_invocation(operation, input, &marked, Some(overlay));
        self.run_invocation(&inv).await?;

        let spec = OutroSpec {
            width: info.width,
            height: info.height,
        };
        self.run_invocation(&build_outro_invocation(&spec, preset, &outro))
            .await?;
        self.run_invocation(&build_outro_brand_invocation(&outro, overlay, preset, &branded))
            .await?;
        self.run_invocation(&build_concat_invocation(
            &marked, &branded, info.fps, preset, output,
        ))
        .await
    }

    async fn run_invocation(&self, inv: &ToolInvocation) -> MediaResult<()> {
        let program = which::which(inv.tool.program()).map_err(|_| MediaError::ToolNotFound {
            tool: inv.tool.program(),
        })?;

        debug!("Running {} {}", inv.tool.program(), inv.args.join(" "));

        let mut child = Command::new(program)
            .args(&inv.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stderr = child.stderr.take().expect("stderr not captured");
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let timeout_secs = self.config.tool_timeout.as_secs();
        let status = match tokio::time::timeout(self.config.tool_timeout, child.wait()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "{} timed out after {}s, killing process",
                    inv.tool.program(),
                    timeout_secs
                );
                let _ = child.kill().await;
                return Err(MediaError::Timeout {
                    tool: inv.tool.program(),
                    secs: timeout_secs,
                });
            }
        };

        let stderr_bytes = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::tool_failed(
                inv.tool.program(),
                status.code(),
                stderr_excerpt(&stderr_bytes),
            ))
        }
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, operation: &Operation, input: &Path, output: &Path) -> MediaResult<()> {
        match operation {
            Operation::Watermark(p) => {
                let (info, overlay) = self.watermark_overlay(input, p.scale_percent).await?;
                if p.append_outro {
                    self.run_watermark_with_outro(operation, &info, &overlay, input, output)
                        .await?;
                } else {
                    let inv = build_invocation(operation, input, output, Some(&overlay));
                    self.run_invocation(&inv).await?;
                }
            }
            _ => {
                let inv = build_invocation(operation, input, output, None);
                self.run_invocation(&inv).await?;
            }
        }

        if !output.exists() {
            return Err(MediaError::InvalidMedia(format!(
                "tool exited cleanly but produced no output at {}",
                output.display()
            )));
        }

        Ok(())
    }
}

/// Bounded stderr excerpt, keeping the tail where the useful error lives.
fn stderr_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT_LIMIT {
        return text.to_string();
    }
    let start = text.len() - STDERR_EXCERPT_LIMIT;
    // Avoid splitting a UTF-8 sequence
    let start = (start..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(start);
    format!("...{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use mflow_models::{EncodePreset, WatermarkParams, WatermarkPosition};

    #[test]
    fn stderr_excerpt_is_bounded() {
        let long = "x".repeat(STDERR_EXCERPT_LIMIT * 2);
        let excerpt = stderr_excerpt(long.as_bytes());
        assert!(excerpt.len() <= STDERR_EXCERPT_LIMIT + 3);
        assert!(excerpt.starts_with("..."));

        assert_eq!(stderr_excerpt(b"  short error\n"), "short error");
    }

    #[tokio::test]
    async fn watermark_without_asset_fails_before_spawning() {
        let runner = ProcessToolRunner::new(RunnerConfig {
            tool_timeout: Duration::from_secs(1),
            watermark_asset: PathBuf::from("/nonexistent/watermark.png"),
        });
        let op = Operation::Watermark(WatermarkParams {
            position: WatermarkPosition::default(),
            opacity: 0.5,
            scale_percent: 10,
            preset: EncodePreset::Ultrafast,
            append_outro: false,
        });

        let err = runner
            .run(&op, Path::new("/tmp/in.mp4"), Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingAsset(_)));
    }
}
