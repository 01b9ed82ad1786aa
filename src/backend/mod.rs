//! Encoder Backend Seam
//!
//! The boundary between the pipeline and whatever actually produces
//! bitstreams: platform media APIs, vendor SDKs, or the built-in software
//! fallback. A backend answers trial-configuration probes, reports explicit
//! hardware capabilities when the platform exposes them, and opens encoding
//! sessions. Sessions are not reentrant: one owner submits samples in
//! presentation order and flushes once.

mod software;

pub use software::SoftwareBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::HardwareAcceleration;
use crate::error::ExportResult;
use crate::formats::{AudioCodec, VideoCodec};
use crate::renderer::MediaSample;
use crate::types::TimeSec;

// =============================================================================
// Encoded Output
// =============================================================================

/// One encoded unit of media in presentation order
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedChunk {
    /// Encoded payload bytes
    pub data: Vec<u8>,
    /// Presentation timestamp in seconds
    pub timestamp: TimeSec,
    /// Duration covered by this chunk in seconds
    pub duration: TimeSec,
    /// Whether this chunk can be decoded without prior chunks
    pub is_key: bool,
}

impl EncodedChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Latency hint for session configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyMode {
    /// Favor compression efficiency
    #[default]
    Quality,
    /// Favor throughput, as a live/hardware path would
    Realtime,
}

/// Configuration for one video encoding session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEncoderConfig {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// Target bitrate in bits per second
    pub bitrate: Option<u64>,
    /// Constant rate factor (lower = better quality)
    pub crf: Option<u8>,
    /// Forced keyframe cadence in frames
    pub keyframe_interval: u32,
    pub latency: LatencyMode,
    pub hardware_acceleration: bool,
}

/// Configuration for one audio encoding session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioEncoderConfig {
    pub codec: AudioCodec,
    /// Bitrate in bits per second
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

// =============================================================================
// Backend Traits
// =============================================================================

/// One live encoding session.
///
/// Chunks come back in presentation order; monotonic timestamps are the
/// caller's precondition and are not re-validated here.
#[async_trait]
pub trait EncoderSession: Send {
    /// Encodes one media sample at the given presentation time.
    ///
    /// May return zero chunks when the session buffers internally; buffered
    /// output is emitted by [`flush`](Self::flush).
    async fn encode(
        &mut self,
        sample: MediaSample<'_>,
        timestamp: TimeSec,
        force_key: bool,
    ) -> ExportResult<Vec<EncodedChunk>>;

    /// Emits any buffered chunks and ends the session
    async fn flush(&mut self) -> ExportResult<Vec<EncodedChunk>>;
}

/// Platform codec boundary.
///
/// `supports_*_config` performs a trial configuration without opening a
/// session; the capability probe uses it for both usability and (on
/// platforms without an explicit query) the hardware heuristic.
pub trait EncoderBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Whether a video session could be opened with this configuration
    fn supports_video_config(&self, config: &VideoEncoderConfig) -> bool;

    /// Whether an audio session could be opened with this configuration
    fn supports_audio_config(&self, config: &AudioEncoderConfig) -> bool;

    /// Explicit hardware capability query.
    ///
    /// `None` means the platform exposes no such query and the caller must
    /// fall back to heuristics; `Some` is authoritative either way.
    fn hardware_capabilities(&self) -> Option<HardwareAcceleration>;

    /// Opens a video encoding session
    fn open_video(&self, config: &VideoEncoderConfig) -> ExportResult<Box<dyn EncoderSession>>;

    /// Opens an audio encoding session
    fn open_audio(&self, config: &AudioEncoderConfig) -> ExportResult<Box<dyn EncoderSession>>;
}
