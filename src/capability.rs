//! Codec Capability Probing
//!
//! Determines which (codec, container) pairs the backend can actually
//! service and whether each benefits from hardware acceleration. Probing is
//! trial-configuration based: a pair that accepts a conservative
//! low-resolution configuration is usable. Hardware detection prefers the
//! backend's explicit capability query; only when the platform exposes none
//! does it fall back to the aggressive-configuration heuristic, where
//! configuration success under realtime 4K settings is treated as evidence
//! of dedicated silicon, not proof.
//!
//! A probe runs once and the returned set is immutable; callers that suspect
//! a device change re-run the probe themselves.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{EncoderBackend, LatencyMode, VideoEncoderConfig};
use crate::formats::{ExportFormat, QualityPreset};
use crate::types::Resolution;

// =============================================================================
// Hardware Acceleration
// =============================================================================

/// Kind of dedicated encode silicon
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelerationKind {
    Nvenc,
    QuickSync,
    Amf,
    VideoToolbox,
    Vaapi,
}

/// Hardware acceleration availability and limits
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareAcceleration {
    /// Whether any dedicated encode hardware is usable
    pub available: bool,
    /// Acceleration type, when the platform identifies one
    pub kind: Option<AccelerationKind>,
    /// Largest frame the hardware path accepts
    pub max_resolution: Resolution,
    /// Highest frame rate the hardware path accepts
    pub max_frame_rate: f64,
    /// Rough throughput multiplier relative to software encoding
    pub performance_multiplier: f64,
}

impl HardwareAcceleration {
    /// No hardware path; software limits apply
    pub fn unavailable() -> Self {
        Self {
            available: false,
            kind: None,
            max_resolution: Resolution::new(8192, 8192),
            max_frame_rate: 240.0,
            performance_multiplier: 1.0,
        }
    }
}

// =============================================================================
// Codec Capability
// =============================================================================

/// Probed capability for one (codec, container) pair.
///
/// Produced once at startup, immutable thereafter, shared read-only by all
/// workers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecCapability {
    pub format: ExportFormat,
    pub hardware_accelerated: bool,
    pub max_resolution: Resolution,
    pub max_frame_rate: f64,
    pub profiles: Vec<String>,
    pub quality_presets: Vec<QualityPreset>,
}

/// Immutable result of one capability probe
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySet {
    pub capabilities: Vec<CodecCapability>,
    pub hardware: HardwareAcceleration,
    pub probed_at: chrono::DateTime<chrono::Utc>,
}

impl CapabilitySet {
    /// Capability entry for a format, if the pair is usable
    pub fn capability(&self, format: ExportFormat) -> Option<&CodecCapability> {
        self.capabilities.iter().find(|c| c.format == format)
    }

    /// Whether the pair is usable at all
    pub fn supports(&self, format: ExportFormat) -> bool {
        self.capability(format).is_some()
    }

    /// Whether the pair has a hardware path
    pub fn is_hardware_accelerated(&self, format: ExportFormat) -> bool {
        self.capability(format)
            .map(|c| c.hardware_accelerated)
            .unwrap_or(false)
    }
}

// =============================================================================
// Capability Probe
// =============================================================================

/// Trial-configuration capability prober
pub struct CapabilityProbe;

impl CapabilityProbe {
    /// Conservative trial settings: any working encoder accepts these
    const TRIAL_RESOLUTION: Resolution = Resolution {
        width: 320,
        height: 180,
    };
    const TRIAL_BITRATE: u64 = 1_000_000;

    /// Aggressive settings used by the hardware heuristic
    const AGGRESSIVE_RESOLUTION: Resolution = Resolution {
        width: 3840,
        height: 2160,
    };
    const AGGRESSIVE_BITRATE: u64 = 80_000_000;
    const AGGRESSIVE_FRAME_RATE: f64 = 60.0;

    /// Probes the backend and returns the immutable capability set
    pub fn probe(backend: &dyn EncoderBackend) -> CapabilitySet {
        let hardware = match backend.hardware_capabilities() {
            Some(hw) => {
                debug!(backend = backend.name(), available = hw.available, "explicit hardware capability query");
                hw
            }
            None => Self::heuristic_hardware(backend),
        };

        let mut capabilities = Vec::new();
        for format in ExportFormat::ALL {
            if !backend.supports_video_config(&Self::trial_config(format)) {
                debug!(?format, "trial configuration rejected, pair unusable");
                continue;
            }

            let hardware_accelerated = hardware.available
                && backend.supports_video_config(&Self::aggressive_config(format));

            let max_resolution = if hardware_accelerated {
                hardware.max_resolution
            } else {
                HardwareAcceleration::unavailable().max_resolution
            };

            capabilities.push(CodecCapability {
                format,
                hardware_accelerated,
                max_resolution,
                max_frame_rate: if hardware_accelerated {
                    hardware.max_frame_rate
                } else {
                    240.0
                },
                profiles: format
                    .video_codec()
                    .profiles()
                    .into_iter()
                    .map(String::from)
                    .collect(),
                quality_presets: QualityPreset::ALL.to_vec(),
            });
        }

        info!(
            backend = backend.name(),
            usable = capabilities.len(),
            hardware = hardware.available,
            "capability probe complete"
        );

        CapabilitySet {
            capabilities,
            hardware,
            probed_at: chrono::Utc::now(),
        }
    }

    /// Configure-and-observe fallback for platforms without an explicit
    /// hardware query. Success under aggressive settings only suggests
    /// dedicated silicon; a fast software encoder can pass this too.
    fn heuristic_hardware(backend: &dyn EncoderBackend) -> HardwareAcceleration {
        let accepted = backend.supports_video_config(&Self::aggressive_config(ExportFormat::Mp4H264));

        if accepted {
            info!(backend = backend.name(), "aggressive trial accepted, assuming hardware acceleration");
            HardwareAcceleration {
                available: true,
                kind: None,
                max_resolution: Self::AGGRESSIVE_RESOLUTION,
                max_frame_rate: Self::AGGRESSIVE_FRAME_RATE,
                performance_multiplier: 4.0,
            }
        } else {
            HardwareAcceleration::unavailable()
        }
    }

    fn trial_config(format: ExportFormat) -> VideoEncoderConfig {
        VideoEncoderConfig {
            codec: format.video_codec(),
            width: Self::TRIAL_RESOLUTION.width,
            height: Self::TRIAL_RESOLUTION.height,
            frame_rate: 30.0,
            bitrate: Some(Self::TRIAL_BITRATE),
            crf: None,
            keyframe_interval: 30,
            latency: LatencyMode::Quality,
            hardware_acceleration: false,
        }
    }

    fn aggressive_config(format: ExportFormat) -> VideoEncoderConfig {
        VideoEncoderConfig {
            codec: format.video_codec(),
            width: Self::AGGRESSIVE_RESOLUTION.width,
            height: Self::AGGRESSIVE_RESOLUTION.height,
            frame_rate: Self::AGGRESSIVE_FRAME_RATE,
            bitrate: Some(Self::AGGRESSIVE_BITRATE),
            crf: None,
            keyframe_interval: 30,
            latency: LatencyMode::Realtime,
            hardware_acceleration: true,
        }
    }
}
