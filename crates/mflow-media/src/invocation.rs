//! Operation-to-argv mapping.
//!
//! One match arm per supported operation. Argument vectors are assembled
//! only from closed enum values, range-checked integers and the two file
//! paths, which closes off argument injection entirely.

use std::path::{Path, PathBuf};

use mflow_models::{EncodePreset, Operation, WatermarkPosition};

/// External binaries this service drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
    Convert,
}

impl Tool {
    /// Program name looked up on PATH.
    pub fn program(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
            Tool::Convert => "convert",
        }
    }
}

/// A fully rendered tool invocation.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub args: Vec<String>,
}

/// Watermark overlay inputs resolved by the runner before invocation:
/// the server-side asset and the overlay height computed from the probed
/// video height.
#[derive(Debug, Clone)]
pub struct WatermarkOverlay {
    pub asset: PathBuf,
    pub overlay_height: u32,
}

/// Duration of the appended outro clip in seconds.
pub const OUTRO_SECONDS: u32 = 1;

/// Outro dimensions, resolved from the probed source video so the
/// generated clip concatenates without rescaling.
#[derive(Debug, Clone)]
pub struct OutroSpec {
    pub width: u32,
    pub height: u32,
}

/// Build the argument vector for `operation` on `input`, writing to
/// `output`. `overlay` must be provided for watermark operations.
pub fn build_invocation(
    operation: &Operation,
    input: &Path,
    output: &Path,
    overlay: Option<&WatermarkOverlay>,
) -> ToolInvocation {
    match operation {
        Operation::Transcode(p) => {
            let mut args = ffmpeg_base(input);

            if let Some(res) = p.resolution {
                args.push("-vf".to_string());
                // -2 keeps the width even while preserving aspect ratio
                args.push(format!("scale=-2:{}", res.height()));
            }

            args.push("-c:v".to_string());
            args.push(p.container.video_codec().to_string());

            if p.container.video_codec() == "libx264" {
                args.push("-preset".to_string());
                args.push(p.preset.as_str().to_string());
                args.push("-crf".to_string());
                args.push("23".to_string());
                args.push("-pix_fmt".to_string());
                args.push("yuv420p".to_string());
            } else {
                // VP9 rate control
                args.push("-crf".to_string());
                args.push("32".to_string());
                args.push("-b:v".to_string());
                args.push("0".to_string());
            }

            args.push("-c:a".to_string());
            args.push(p.container.audio_codec().to_string());
            args.push(output.to_string_lossy().to_string());

            ToolInvocation {
                tool: Tool::Ffmpeg,
                args,
            }
        }

        Operation::Watermark(p) => {
            let overlay = overlay.expect("watermark invocation requires overlay inputs");
            let mut args = ffmpeg_base(input);

            // Second input: the watermark asset
            args.push("-i".to_string());
            args.push(overlay.asset.to_string_lossy().to_string());

            args.push("-filter_complex".to_string());
            args.push(format!(
                "[1:v]scale=-1:{},format=rgba,colorchannelmixer=aa={:.2}[wm];[0:v][wm]overlay={}",
                overlay.overlay_height,
                p.opacity,
                overlay_expr(p.position),
            ));

            // The container stays the same as the source, so the codec
            // follows the output extension
            if output.extension().and_then(|e| e.to_str()) == Some("webm") {
                args.push("-c:v".to_string());
                args.push("libvpx-vp9".to_string());
                args.push("-crf".to_string());
                args.push("32".to_string());
                args.push("-b:v".to_string());
                args.push("0".to_string());
            } else {
                args.push("-c:v".to_string());
                args.push("libx264".to_string());
                args.push("-preset".to_string());
                args.push(p.preset.as_str().to_string());
                args.push("-pix_fmt".to_string());
                args.push("yuv420p".to_string());
            }
            args.push("-c:a".to_string());
            args.push("copy".to_string());
            args.push(output.to_string_lossy().to_string());

            ToolInvocation {
                tool: Tool::Ffmpeg,
                args,
            }
        }

        Operation::ImageConvert(p) => {
            let mut args = vec![input.to_string_lossy().to_string()];

            let geometry = match (p.width, p.height) {
                (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
                (Some(w), None) => Some(format!("{}x", w)),
                (None, Some(h)) => Some(format!("x{}", h)),
                (None, None) => None,
            };
            if let Some(g) = geometry {
                args.push("-resize".to_string());
                args.push(g);
            }

            if let Some(q) = p.quality {
                args.push("-quality".to_string());
                args.push(q.to_string());
            }

            // Output format is chosen by the destination extension
            args.push(output.to_string_lossy().to_string());

            ToolInvocation {
                tool: Tool::Convert,
                args,
            }
        }
    }
}

/// Render a silent black clip matching the source dimensions, used as the
/// base of the appended outro.
pub fn build_outro_invocation(
    spec: &OutroSpec,
    preset: EncodePreset,
    output: &Path,
) -> ToolInvocation {
    let args = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!(
            "color=c=black:s={}x{}:d={}",
            spec.width, spec.height, OUTRO_SECONDS
        ),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!(
            "anullsrc=channel_layout=stereo:sample_rate=44100:d={}",
            OUTRO_SECONDS
        ),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-shortest".to_string(),
        "-preset".to_string(),
        preset.as_str().to_string(),
        "-tune".to_string(),
        "stillimage".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        output.to_string_lossy().to_string(),
    ];

    ToolInvocation {
        tool: Tool::Ffmpeg,
        args,
    }
}

/// Overlay the watermark asset centered and opaque on the outro clip.
pub fn build_outro_brand_invocation(
    outro: &Path,
    overlay: &WatermarkOverlay,
    preset: EncodePreset,
    output: &Path,
) -> ToolInvocation {
    let mut args = ffmpeg_base(outro);
    args.push("-i".to_string());
    args.push(overlay.asset.to_string_lossy().to_string());
    args.push("-filter_complex".to_string());
    args.push(format!(
        "[1:v]scale=-1:{}[wm];[0:v][wm]overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2",
        overlay.overlay_height,
    ));
    args.push("-c:v".to_string());
    args.push("libx264".to_string());
    args.push("-preset".to_string());
    args.push(preset.as_str().to_string());
    args.push("-c:a".to_string());
    args.push("copy".to_string());
    args.push(output.to_string_lossy().to_string());

    ToolInvocation {
        tool: Tool::Ffmpeg,
        args,
    }
}

/// Concatenate the watermarked video with the branded outro, normalizing
/// the outro to the source frame rate.
pub fn build_concat_invocation(
    main: &Path,
    outro: &Path,
    fps: f64,
    preset: EncodePreset,
    output: &Path,
) -> ToolInvocation {
    let mut args = ffmpeg_base(main);
    args.push("-i".to_string());
    args.push(outro.to_string_lossy().to_string());
    args.push("-filter_complex".to_string());
    args.push(format!(
        "[1:v]fps={}[v1];[0:v][0:a][v1][1:a]concat=n=2:v=1:a=1[outv][outa]",
        fps,
    ));
    args.push("-map".to_string());
    args.push("[outv]".to_string());
    args.push("-map".to_string());
    args.push("[outa]".to_string());
    args.push("-c:v".to_string());
    args.push("libx264".to_string());
    args.push("-preset".to_string());
    args.push(preset.as_str().to_string());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());
    args.push(output.to_string_lossy().to_string());

    ToolInvocation {
        tool: Tool::Ffmpeg,
        args,
    }
}

/// Common ffmpeg prelude: overwrite output, quiet logging, primary input.
fn ffmpeg_base(input: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ]
}

/// Fixed overlay position expressions (10px margin from the chosen edges).
fn overlay_expr(position: WatermarkPosition) -> &'static str {
    match position {
        WatermarkPosition::TopLeft => "10:10",
        WatermarkPosition::TopRight => "main_w-overlay_w-10:10",
        WatermarkPosition::BottomLeft => "10:main_h-overlay_h-10",
        WatermarkPosition::BottomRight => "main_w-overlay_w-10:main_h-overlay_h-10",
        WatermarkPosition::Center => "(main_w-overlay_w)/2:(main_h-overlay_h)/2",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mflow_models::{
        EncodePreset, ImageConvertParams, ImageFormat, Resolution, TranscodeParams,
        VideoContainer, WatermarkParams,
    };

    #[test]
    fn transcode_invocation_uses_container_codecs() {
        let op = Operation::Transcode(TranscodeParams {
            container: VideoContainer::Mp4,
            resolution: Some(Resolution::P720),
            preset: EncodePreset::Fast,
        });
        let inv = build_invocation(&op, Path::new("/w/in.mov"), Path::new("/w/out.mp4"), None);

        assert_eq!(inv.tool, Tool::Ffmpeg);
        assert!(inv.args.contains(&"libx264".to_string()));
        assert!(inv.args.contains(&"aac".to_string()));
        assert!(inv.args.contains(&"scale=-2:720".to_string()));
        assert!(inv.args.contains(&"fast".to_string()));
        assert_eq!(inv.args.last().unwrap(), "/w/out.mp4");
    }

    #[test]
    fn webm_transcode_uses_vp9_without_x264_preset() {
        let op = Operation::Transcode(TranscodeParams {
            container: VideoContainer::Webm,
            resolution: None,
            preset: EncodePreset::Medium,
        });
        let inv = build_invocation(&op, Path::new("in.mp4"), Path::new("out.webm"), None);

        assert!(inv.args.contains(&"libvpx-vp9".to_string()));
        assert!(inv.args.contains(&"libopus".to_string()));
        assert!(!inv.args.contains(&"-preset".to_string()));
        assert!(!inv.args.contains(&"-vf".to_string()));
    }

    #[test]
    fn watermark_invocation_renders_overlay_filter() {
        let op = Operation::Watermark(WatermarkParams {
            position: WatermarkPosition::BottomRight,
            opacity: 0.5,
            scale_percent: 10,
            preset: EncodePreset::Ultrafast,
            append_outro: false,
        });
        let overlay = WatermarkOverlay {
            asset: PathBuf::from("/app/assets/watermark.png"),
            overlay_height: 108,
        };
        let inv = build_invocation(
            &op,
            Path::new("/w/in.mp4"),
            Path::new("/w/out.mp4"),
            Some(&overlay),
        );

        let filter = inv
            .args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| &inv.args[i + 1])
            .unwrap();
        assert!(filter.contains("scale=-1:108"));
        assert!(filter.contains("colorchannelmixer=aa=0.50"));
        assert!(filter.contains("overlay=main_w-overlay_w-10:main_h-overlay_h-10"));
        // Audio is passed through untouched
        assert!(inv.args.contains(&"copy".to_string()));
        assert!(inv.args.contains(&"libx264".to_string()));
    }

    #[test]
    fn watermark_on_webm_source_keeps_a_webm_codec() {
        let op = Operation::Watermark(WatermarkParams {
            position: WatermarkPosition::default(),
            opacity: 0.5,
            scale_percent: 10,
            preset: EncodePreset::Ultrafast,
            append_outro: false,
        });
        let overlay = WatermarkOverlay {
            asset: PathBuf::from("/app/assets/watermark.png"),
            overlay_height: 72,
        };
        let inv = build_invocation(
            &op,
            Path::new("/w/in.webm"),
            Path::new("/w/out.webm"),
            Some(&overlay),
        );

        assert!(inv.args.contains(&"libvpx-vp9".to_string()));
        assert!(!inv.args.contains(&"libx264".to_string()));
    }

    #[test]
    fn outro_invocation_renders_a_silent_black_clip() {
        let spec = OutroSpec {
            width: 1920,
            height: 1080,
        };
        let inv = build_outro_invocation(&spec, EncodePreset::Ultrafast, Path::new("/w/outro.mp4"));

        assert_eq!(inv.tool, Tool::Ffmpeg);
        assert!(inv.args.contains(&"color=c=black:s=1920x1080:d=1".to_string()));
        assert!(inv
            .args
            .contains(&"anullsrc=channel_layout=stereo:sample_rate=44100:d=1".to_string()));
        assert!(inv.args.contains(&"stillimage".to_string()));
        assert_eq!(inv.args.last().unwrap(), "/w/outro.mp4");
    }

    #[test]
    fn outro_brand_invocation_centers_the_overlay() {
        let overlay = WatermarkOverlay {
            asset: PathBuf::from("/app/assets/watermark.png"),
            overlay_height: 108,
        };
        let inv = build_outro_brand_invocation(
            Path::new("/w/outro.mp4"),
            &overlay,
            EncodePreset::Ultrafast,
            Path::new("/w/outro_branded.mp4"),
        );

        let filter = inv
            .args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| &inv.args[i + 1])
            .unwrap();
        assert!(filter.contains("scale=-1:108"));
        assert!(filter.contains("overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2"));
        // Branding stays opaque; only the main overlay is blended
        assert!(!filter.contains("colorchannelmixer"));
    }

    #[test]
    fn concat_invocation_joins_video_and_outro_at_source_fps() {
        let inv = build_concat_invocation(
            Path::new("/w/marked.mp4"),
            Path::new("/w/outro_branded.mp4"),
            29.97,
            EncodePreset::Ultrafast,
            Path::new("/w/out.mp4"),
        );

        let filter = inv
            .args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| &inv.args[i + 1])
            .unwrap();
        assert!(filter.contains("fps=29.97"));
        assert!(filter.contains("concat=n=2:v=1:a=1"));
        assert!(inv.args.contains(&"[outv]".to_string()));
        assert!(inv.args.contains(&"[outa]".to_string()));
        assert_eq!(inv.args.last().unwrap(), "/w/out.mp4");
    }

    #[test]
    fn image_convert_invocation_builds_geometry() {
        let op = Operation::ImageConvert(ImageConvertParams {
            format: ImageFormat::Jpeg,
            width: Some(800),
            height: None,
            quality: Some(85),
        });
        let inv = build_invocation(&op, Path::new("/w/in.png"), Path::new("/w/out.jpg"), None);

        assert_eq!(inv.tool, Tool::Convert);
        assert_eq!(
            inv.args,
            vec!["/w/in.png", "-resize", "800x", "-quality", "85", "/w/out.jpg"]
        );
    }

    #[test]
    fn argv_contains_only_closed_values_and_paths() {
        // No argument may start with '-' unless it is one of our fixed
        // flags; parameters render as bare numbers/geometry only.
        let op = Operation::ImageConvert(ImageConvertParams {
            format: ImageFormat::Png,
            width: Some(100),
            height: Some(100),
            quality: None,
        });
        let inv = build_invocation(&op, Path::new("in.gif"), Path::new("out.png"), None);
        for arg in &inv.args {
            if arg.starts_with('-') {
                assert!(["-resize", "-quality"].contains(&arg.as_str()));
            }
        }
    }
}
