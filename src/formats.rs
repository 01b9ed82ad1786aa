//! Export Formats and Options
//!
//! Container/codec pairs, quality presets with their bitrate table, output
//! destinations, and the validated option set a caller hands to
//! `create_export_job`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::jobs::Priority;
use crate::types::{Composition, Resolution, TimeSec};

// =============================================================================
// Containers and Codecs
// =============================================================================

/// Output container format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Mp4,
    Webm,
    Mov,
    Gif,
}

impl Container {
    /// Declared media type for blobs produced into this container
    pub fn media_type(&self) -> &'static str {
        match self {
            Container::Mp4 => "video/mp4",
            Container::Webm => "video/webm",
            Container::Mov => "video/quicktime",
            Container::Gif => "image/gif",
        }
    }

    /// Whether the container can carry an audio stream
    pub fn supports_audio(&self) -> bool {
        !matches!(self, Container::Gif)
    }
}

/// Video codec selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Av1,
    ProRes,
    DnxHd,
    Gif,
}

impl VideoCodec {
    /// Profile names commonly exposed by encoder implementations
    pub fn profiles(&self) -> Vec<&'static str> {
        match self {
            VideoCodec::H264 => vec!["baseline", "main", "high"],
            VideoCodec::H265 => vec!["main", "main10"],
            VideoCodec::Vp9 => vec!["profile0", "profile2"],
            VideoCodec::Av1 => vec!["main"],
            VideoCodec::ProRes => vec!["proxy", "lt", "standard", "hq"],
            VideoCodec::DnxHd => vec!["dnxhr_lb", "dnxhr_sq", "dnxhr_hq"],
            VideoCodec::Gif => vec![],
        }
    }
}

/// Audio codec selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Aac,
    Opus,
    Pcm,
}

/// Fixed set of supported (container, codec) pairs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Mp4H264,
    Mp4H265,
    WebmVp9,
    WebmAv1,
    MovProRes,
    MovDnxHd,
    Gif,
}

impl ExportFormat {
    /// All supported pairs, in probe order
    pub const ALL: [ExportFormat; 7] = [
        ExportFormat::Mp4H264,
        ExportFormat::Mp4H265,
        ExportFormat::WebmVp9,
        ExportFormat::WebmAv1,
        ExportFormat::MovProRes,
        ExportFormat::MovDnxHd,
        ExportFormat::Gif,
    ];

    pub fn container(&self) -> Container {
        match self {
            ExportFormat::Mp4H264 | ExportFormat::Mp4H265 => Container::Mp4,
            ExportFormat::WebmVp9 | ExportFormat::WebmAv1 => Container::Webm,
            ExportFormat::MovProRes | ExportFormat::MovDnxHd => Container::Mov,
            ExportFormat::Gif => Container::Gif,
        }
    }

    pub fn video_codec(&self) -> VideoCodec {
        match self {
            ExportFormat::Mp4H264 => VideoCodec::H264,
            ExportFormat::Mp4H265 => VideoCodec::H265,
            ExportFormat::WebmVp9 => VideoCodec::Vp9,
            ExportFormat::WebmAv1 => VideoCodec::Av1,
            ExportFormat::MovProRes => VideoCodec::ProRes,
            ExportFormat::MovDnxHd => VideoCodec::DnxHd,
            ExportFormat::Gif => VideoCodec::Gif,
        }
    }

    /// Audio codec paired with this container, if the container carries audio
    pub fn audio_codec(&self) -> Option<AudioCodec> {
        match self.container() {
            Container::Mp4 => Some(AudioCodec::Aac),
            Container::Webm => Some(AudioCodec::Opus),
            Container::Mov => Some(AudioCodec::Pcm),
            Container::Gif => None,
        }
    }
}

// =============================================================================
// Quality
// =============================================================================

/// Named quality tiers with a fixed video bitrate table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Low,
    Medium,
    High,
    Lossless,
}

impl QualityPreset {
    /// All tiers, in ascending quality order
    pub const ALL: [QualityPreset; 4] = [
        QualityPreset::Low,
        QualityPreset::Medium,
        QualityPreset::High,
        QualityPreset::Lossless,
    ];

    /// Target video bitrate in bits per second.
    ///
    /// Presets only shape the video stream; audio configuration is fixed
    /// independently of the preset.
    pub fn video_bitrate(&self) -> u64 {
        match self {
            QualityPreset::Low => 2_000_000,
            QualityPreset::Medium => 5_000_000,
            QualityPreset::High => 10_000_000,
            QualityPreset::Lossless => 50_000_000,
        }
    }
}

/// Quality selection: a named preset or custom rate-control values
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Quality {
    Preset { preset: QualityPreset },
    Custom {
        /// Target bitrate in bits per second
        bitrate: Option<u64>,
        /// Constant rate factor (lower = better quality)
        crf: Option<u8>,
    },
}

impl Quality {
    pub fn preset(preset: QualityPreset) -> Self {
        Quality::Preset { preset }
    }

    /// Resolved target video bitrate, if one applies
    pub fn video_bitrate(&self) -> Option<u64> {
        match self {
            Quality::Preset { preset } => Some(preset.video_bitrate()),
            Quality::Custom { bitrate, .. } => *bitrate,
        }
    }

    /// Resolved CRF, if one applies
    pub fn crf(&self) -> Option<u8> {
        match self {
            Quality::Preset { .. } => None,
            Quality::Custom { crf, .. } => *crf,
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Preset {
            preset: QualityPreset::Medium,
        }
    }
}

// =============================================================================
// Destination
// =============================================================================

/// Where encoded output ends up
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// Write streams to disk on completion
    File { path: PathBuf, overwrite: bool },
    /// Keep streams in memory for one-shot retrieval
    Memory,
    /// Buffered like memory; incremental sinks belong to the muxer collaborator
    Stream,
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Memory
    }
}

// =============================================================================
// Export Options
// =============================================================================

/// Caller-supplied options for one export job
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// Container + codec pair
    pub format: ExportFormat,
    /// Quality preset or custom rate control
    pub quality: Quality,
    /// Output destination
    pub destination: Destination,
    /// Export range start in seconds (None = composition start)
    pub start_time: Option<TimeSec>,
    /// Export range end in seconds (None = composition end)
    pub end_time: Option<TimeSec>,
    /// Output resolution override (None = composition resolution)
    pub resolution: Option<Resolution>,
    /// Frame rate override (None = composition frame rate)
    pub frame_rate: Option<f64>,
    /// Opt in to hardware-accelerated encoding when available
    pub hardware_acceleration: bool,
    /// Scheduling priority
    pub priority: Priority,
    /// Include the composition's audio track if it has one
    pub include_audio: bool,
    /// Audio bitrate override in bits per second
    pub audio_bitrate: Option<u32>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Mp4H264,
            quality: Quality::default(),
            destination: Destination::Memory,
            start_time: None,
            end_time: None,
            resolution: None,
            frame_rate: None,
            hardware_acceleration: false,
            priority: Priority::Normal,
            include_audio: true,
            audio_bitrate: None,
        }
    }
}

impl ExportOptions {
    /// Validates the options against the composition being exported
    pub fn validate(&self, composition: &Composition) -> ExportResult<()> {
        if composition.duration_sec <= 0.0 || !composition.duration_sec.is_finite() {
            return Err(ExportError::InvalidOptions(format!(
                "composition duration must be positive, got {}",
                composition.duration_sec
            )));
        }

        let frame_rate = self.frame_rate.unwrap_or(composition.frame_rate);
        if frame_rate <= 0.0 || !frame_rate.is_finite() {
            return Err(ExportError::InvalidOptions(format!(
                "frame rate must be positive, got {frame_rate}"
            )));
        }

        let start = self.start_time.unwrap_or(0.0);
        let end = self.end_time.unwrap_or(composition.duration_sec);
        if start < 0.0 {
            return Err(ExportError::InvalidOptions(format!(
                "start time must be non-negative, got {start}"
            )));
        }
        if end <= start {
            return Err(ExportError::InvalidOptions(format!(
                "end time {end} must be after start time {start}"
            )));
        }
        if end > composition.duration_sec + f64::EPSILON {
            return Err(ExportError::InvalidOptions(format!(
                "end time {end} exceeds composition duration {}",
                composition.duration_sec
            )));
        }

        if let Some(resolution) = self.resolution {
            if resolution.width == 0 || resolution.height == 0 {
                return Err(ExportError::InvalidOptions(format!(
                    "resolution must be non-zero, got {resolution}"
                )));
            }
        }

        if let Quality::Custom { bitrate, crf } = self.quality {
            if bitrate.is_none() && crf.is_none() {
                return Err(ExportError::InvalidOptions(
                    "custom quality requires a bitrate or a CRF value".to_string(),
                ));
            }
            if let Some(crf) = crf {
                if crf > 63 {
                    return Err(ExportError::InvalidOptions(format!(
                        "CRF must be 0-63, got {crf}"
                    )));
                }
            }
            if let Some(bitrate) = bitrate {
                if bitrate == 0 {
                    return Err(ExportError::InvalidOptions(
                        "custom bitrate must be non-zero".to_string(),
                    ));
                }
            }
        }

        if let Some(audio_bitrate) = self.audio_bitrate {
            if !(32_000..=512_000).contains(&audio_bitrate) {
                return Err(ExportError::InvalidOptions(format!(
                    "audio bitrate must be 32-512 kbps, got {audio_bitrate}"
                )));
            }
        }

        if let Destination::File { path, .. } = &self.destination {
            if path.as_os_str().is_empty() {
                return Err(ExportError::InvalidOptions(
                    "file destination requires a path".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Effective export range `[start, end)` in composition time
    pub fn time_range(&self, composition: &Composition) -> (TimeSec, TimeSec) {
        (
            self.start_time.unwrap_or(0.0),
            self.end_time.unwrap_or(composition.duration_sec),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_composition() -> Composition {
        Composition::new("comp_001", 10.0, 30.0, 1920, 1080)
    }

    #[test]
    fn test_container_media_types() {
        assert_eq!(ExportFormat::Mp4H264.container().media_type(), "video/mp4");
        assert_eq!(ExportFormat::WebmAv1.container().media_type(), "video/webm");
        assert_eq!(
            ExportFormat::MovProRes.container().media_type(),
            "video/quicktime"
        );
        assert_eq!(ExportFormat::Gif.container().media_type(), "image/gif");
    }

    #[test]
    fn test_gif_has_no_audio() {
        assert!(!Container::Gif.supports_audio());
        assert!(ExportFormat::Gif.audio_codec().is_none());
        assert!(ExportFormat::Mp4H264.audio_codec().is_some());
    }

    #[test]
    fn test_preset_bitrate_table() {
        assert_eq!(QualityPreset::Low.video_bitrate(), 2_000_000);
        assert_eq!(QualityPreset::Medium.video_bitrate(), 5_000_000);
        assert_eq!(QualityPreset::High.video_bitrate(), 10_000_000);
        assert_eq!(QualityPreset::Lossless.video_bitrate(), 50_000_000);
    }

    #[test]
    fn test_default_options_validate() {
        let options = ExportOptions::default();
        assert!(options.validate(&test_composition()).is_ok());
    }

    #[test]
    fn test_invalid_time_range_rejected() {
        let options = ExportOptions {
            start_time: Some(5.0),
            end_time: Some(2.0),
            ..Default::default()
        };
        let err = options.validate(&test_composition()).unwrap_err();
        assert_eq!(err.code(), "INVALID_OPTIONS");

        let options = ExportOptions {
            end_time: Some(11.0),
            ..Default::default()
        };
        assert!(options.validate(&test_composition()).is_err());
    }

    #[test]
    fn test_custom_quality_requires_rate_control() {
        let options = ExportOptions {
            quality: Quality::Custom {
                bitrate: None,
                crf: None,
            },
            ..Default::default()
        };
        assert!(options.validate(&test_composition()).is_err());

        let options = ExportOptions {
            quality: Quality::Custom {
                bitrate: None,
                crf: Some(23),
            },
            ..Default::default()
        };
        assert!(options.validate(&test_composition()).is_ok());
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let options = ExportOptions {
            resolution: Some(Resolution::new(0, 1080)),
            ..Default::default()
        };
        assert!(options.validate(&test_composition()).is_err());
    }
}
