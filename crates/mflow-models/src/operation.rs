//! The closed set of supported processing operations.
//!
//! Every parameter is a closed enum or a range-checked integer. Argument
//! vectors for the external tools are rendered from these values only,
//! never from free-form request strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Validation failure for an operation request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("unsupported input format: {0:?}")]
    UnsupportedInput(String),

    #[error("dimension {0} out of range (1..=16384)")]
    DimensionOutOfRange(u32),

    #[error("quality {0} out of range (1..=100)")]
    QualityOutOfRange(u8),

    #[error("opacity {0} out of range (0.0..=1.0)")]
    OpacityOutOfRange(f32),

    #[error("watermark scale {0}% out of range (1..=50)")]
    ScaleOutOfRange(u8),
}

/// Operation kind, without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Transcode,
    ImageConvert,
    Watermark,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Transcode => "transcode",
            OperationKind::ImageConvert => "image_convert",
            OperationKind::Watermark => "watermark",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target video container for transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoContainer {
    Mp4,
    Mov,
    Avi,
    Webm,
}

impl VideoContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoContainer::Mp4 => "mp4",
            VideoContainer::Mov => "mov",
            VideoContainer::Avi => "avi",
            VideoContainer::Webm => "webm",
        }
    }

    /// Video codec paired with this container. Derived, never caller-supplied.
    pub fn video_codec(&self) -> &'static str {
        match self {
            VideoContainer::Webm => "libvpx-vp9",
            _ => "libx264",
        }
    }

    /// Audio codec paired with this container.
    pub fn audio_codec(&self) -> &'static str {
        match self {
            VideoContainer::Webm => "libopus",
            _ => "aac",
        }
    }
}

/// Target vertical resolution for transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    P480,
    P720,
    P1080,
    P2160,
}

impl Resolution {
    pub fn height(&self) -> u32 {
        match self {
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
            Resolution::P2160 => 2160,
        }
    }
}

/// Encoder speed/quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncodePreset {
    #[default]
    Ultrafast,
    Fast,
    Medium,
    Slow,
}

impl EncodePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodePreset::Ultrafast => "ultrafast",
            EncodePreset::Fast => "fast",
            EncodePreset::Medium => "medium",
            EncodePreset::Slow => "slow",
        }
    }
}

/// Target image format for conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }
}

/// Watermark overlay position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

/// Parameters for a video transcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeParams {
    /// Target container
    pub container: VideoContainer,
    /// Target vertical resolution; source resolution when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Encoder preset
    #[serde(default)]
    pub preset: EncodePreset,
}

/// Parameters for an image conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConvertParams {
    /// Target format
    pub format: ImageFormat,
    /// Target width in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Target height in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Compression quality (1-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

fn default_opacity() -> f32 {
    0.5
}

fn default_scale_percent() -> u8 {
    10
}

/// Parameters for a video watermark overlay.
///
/// The watermark image itself is a server-side asset configured on the
/// tool runner; requests only choose placement, opacity and scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkParams {
    /// Overlay position
    #[serde(default)]
    pub position: WatermarkPosition,
    /// Overlay opacity (0.0 transparent, 1.0 opaque)
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Overlay height as a percentage of the video height
    #[serde(default = "default_scale_percent")]
    pub scale_percent: u8,
    /// Encoder preset for the re-encode
    #[serde(default)]
    pub preset: EncodePreset,
    /// Append a one-second branded outro clip after the watermarked video
    #[serde(default)]
    pub append_outro: bool,
}

/// Source video formats accepted for transcode and watermark jobs.
const SUPPORTED_VIDEO_INPUTS: &[&str] = &["mp4", "mov", "avi", "webm"];

/// Source image formats accepted for conversion jobs.
const SUPPORTED_IMAGE_INPUTS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// A requested processing operation with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "parameters", rename_all = "snake_case")]
pub enum Operation {
    Transcode(TranscodeParams),
    ImageConvert(ImageConvertParams),
    Watermark(WatermarkParams),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Transcode(_) => OperationKind::Transcode,
            Operation::ImageConvert(_) => OperationKind::ImageConvert,
            Operation::Watermark(_) => OperationKind::Watermark,
        }
    }

    /// File extension of the artifact this operation produces.
    pub fn output_extension(&self, input_ref: &str) -> String {
        match self {
            Operation::Transcode(p) => p.container.extension().to_string(),
            Operation::ImageConvert(p) => p.format.extension().to_string(),
            // Watermarking keeps the source container
            Operation::Watermark(_) => input_extension(input_ref)
                .unwrap_or_else(|| "mp4".to_string()),
        }
    }

    /// Validate parameters and the input reference against the closed
    /// supported set. Called at submission, before any job record exists.
    pub fn validate(&self, input_ref: &str) -> Result<(), OperationError> {
        let ext = input_extension(input_ref)
            .ok_or_else(|| OperationError::UnsupportedInput(input_ref.to_string()))?;

        match self {
            Operation::Transcode(_) => {
                if !SUPPORTED_VIDEO_INPUTS.contains(&ext.as_str()) {
                    return Err(OperationError::UnsupportedInput(ext));
                }
            }
            Operation::Watermark(p) => {
                if !SUPPORTED_VIDEO_INPUTS.contains(&ext.as_str()) {
                    return Err(OperationError::UnsupportedInput(ext));
                }
                // The outro is rendered with H.264, which webm cannot carry
                if p.append_outro && ext == "webm" {
                    return Err(OperationError::UnsupportedInput(ext));
                }
            }
            Operation::ImageConvert(_) => {
                if !SUPPORTED_IMAGE_INPUTS.contains(&ext.as_str()) {
                    return Err(OperationError::UnsupportedInput(ext));
                }
            }
        }

        match self {
            Operation::Transcode(_) => Ok(()),
            Operation::ImageConvert(p) => {
                for dim in [p.width, p.height].into_iter().flatten() {
                    if dim == 0 || dim > 16384 {
                        return Err(OperationError::DimensionOutOfRange(dim));
                    }
                }
                if let Some(q) = p.quality {
                    if q == 0 || q > 100 {
                        return Err(OperationError::QualityOutOfRange(q));
                    }
                }
                Ok(())
            }
            Operation::Watermark(p) => {
                if !(0.0..=1.0).contains(&p.opacity) {
                    return Err(OperationError::OpacityOutOfRange(p.opacity));
                }
                if p.scale_percent == 0 || p.scale_percent > 50 {
                    return Err(OperationError::ScaleOutOfRange(p.scale_percent));
                }
                Ok(())
            }
        }
    }
}

/// Lowercased extension of an input reference, if any.
fn input_extension(input_ref: &str) -> Option<String> {
    Path::new(input_ref)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcode_accepts_supported_video_inputs() {
        let op = Operation::Transcode(TranscodeParams {
            container: VideoContainer::Mp4,
            resolution: Some(Resolution::P720),
            preset: EncodePreset::default(),
        });
        assert!(op.validate("trans-video/clip.mp4").is_ok());
        assert!(op.validate("trans-video/clip.MOV").is_ok());
        assert!(op.validate("clip.mkv").is_err());
        assert!(op.validate("no-extension").is_err());
    }

    #[test]
    fn image_convert_rejects_out_of_range_params() {
        let base = ImageConvertParams {
            format: ImageFormat::Jpeg,
            width: Some(800),
            height: None,
            quality: Some(85),
        };
        let op = Operation::ImageConvert(base.clone());
        assert!(op.validate("photos/cat.png").is_ok());

        let op = Operation::ImageConvert(ImageConvertParams {
            width: Some(0),
            ..base.clone()
        });
        assert_eq!(
            op.validate("photos/cat.png"),
            Err(OperationError::DimensionOutOfRange(0))
        );

        let op = Operation::ImageConvert(ImageConvertParams {
            quality: Some(101),
            ..base
        });
        assert_eq!(
            op.validate("photos/cat.png"),
            Err(OperationError::QualityOutOfRange(101))
        );
    }

    #[test]
    fn image_convert_rejects_video_input() {
        let op = Operation::ImageConvert(ImageConvertParams {
            format: ImageFormat::Png,
            width: None,
            height: None,
            quality: None,
        });
        assert!(matches!(
            op.validate("clips/video.mp4"),
            Err(OperationError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn watermark_validates_opacity_and_scale() {
        let ok = Operation::Watermark(WatermarkParams {
            position: WatermarkPosition::BottomRight,
            opacity: 0.5,
            scale_percent: 10,
            preset: EncodePreset::Ultrafast,
            append_outro: false,
        });
        assert!(ok.validate("v.mp4").is_ok());

        let bad = Operation::Watermark(WatermarkParams {
            opacity: 1.5,
            ..match ok.clone() {
                Operation::Watermark(p) => p,
                _ => unreachable!(),
            }
        });
        assert!(matches!(
            bad.validate("v.mp4"),
            Err(OperationError::OpacityOutOfRange(_))
        ));
    }

    #[test]
    fn watermark_outro_rejects_webm_input() {
        let op = Operation::Watermark(WatermarkParams {
            position: WatermarkPosition::default(),
            opacity: 0.5,
            scale_percent: 10,
            preset: EncodePreset::Ultrafast,
            append_outro: true,
        });
        assert!(op.validate("clips/v.mp4").is_ok());
        assert!(matches!(
            op.validate("clips/v.webm"),
            Err(OperationError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn watermark_defaults_apply_on_deserialization() {
        let op: Operation = serde_json::from_str(
            r#"{"operation": "watermark", "parameters": {}}"#,
        )
        .unwrap();
        match op {
            Operation::Watermark(p) => {
                assert_eq!(p.position, WatermarkPosition::BottomRight);
                assert_eq!(p.opacity, 0.5);
                assert_eq!(p.scale_percent, 10);
                assert!(!p.append_outro);
            }
            _ => panic!("expected watermark"),
        }
    }

    #[test]
    fn operation_errors_compare_by_value() {
        assert_eq!(
            OperationError::OpacityOutOfRange(1.5),
            OperationError::OpacityOutOfRange(1.5)
        );
        assert_ne!(
            OperationError::OpacityOutOfRange(1.5),
            OperationError::ScaleOutOfRange(51)
        );
    }

    #[test]
    fn operation_wire_shape_is_tagged() {
        let op = Operation::Transcode(TranscodeParams {
            container: VideoContainer::Webm,
            resolution: None,
            preset: EncodePreset::Medium,
        });
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["operation"], "transcode");
        assert_eq!(value["parameters"]["container"], "webm");

        let back: Operation = serde_json::from_value(value).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn output_extension_follows_target_format() {
        let op = Operation::Transcode(TranscodeParams {
            container: VideoContainer::Webm,
            resolution: None,
            preset: EncodePreset::default(),
        });
        assert_eq!(op.output_extension("in.mp4"), "webm");

        let op = Operation::Watermark(WatermarkParams {
            position: WatermarkPosition::default(),
            opacity: 0.5,
            scale_percent: 10,
            preset: EncodePreset::default(),
            append_outro: false,
        });
        assert_eq!(op.output_extension("in.mov"), "mov");
    }
}
