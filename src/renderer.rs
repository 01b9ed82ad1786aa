//! Renderer Boundary
//!
//! The export pipeline does not rasterize anything itself: rendered frames
//! and audio samples come from an external [`Renderer`] collaborator, one
//! request per frame timestamp. This module defines that trait plus the
//! typed media structures that cross the encoder seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExportResult;
use crate::types::{Composition, Resolution, TimeSec};

// =============================================================================
// Media Structures
// =============================================================================

/// Pixel layout of a rendered frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba8,
    /// 8-bit BGRA, 4 bytes per pixel
    Bgra8,
    /// 4:2:0 biplanar YUV, 1.5 bytes per pixel
    Nv12,
}

impl PixelFormat {
    /// Expected buffer length in bytes for the given dimensions
    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => pixels * 4,
            PixelFormat::Nv12 => pixels + pixels / 2,
        }
    }
}

/// One rendered image, produced by the renderer for a single timestamp
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Raw pixel data in `format` layout
    pub data: Vec<u8>,
}

impl RenderedFrame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Whether the data buffer matches the declared format and dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.format.buffer_len(self.width, self.height)
    }
}

/// Planar audio samples for one frame window.
///
/// Samples are 32-bit float, one `Vec` per channel, all channels the same
/// length.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioBuffer {
    pub sample_rate: u32,
    /// Per-channel planar samples
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Silent buffer covering `window` seconds
    pub fn silence(sample_rate: u32, channel_count: usize, window: TimeSec) -> Self {
        let frames = (window * sample_rate as f64).round() as usize;
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sample frames per channel
    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Window duration covered by this buffer, in seconds
    pub fn duration(&self) -> TimeSec {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Tagged union of media inputs at the encoder-session seam.
///
/// Sessions accept exactly one of these per encode call; the tag replaces
/// any dynamically-typed "frame or samples" argument.
#[derive(Clone, Copy, Debug)]
pub enum MediaSample<'a> {
    Frame(&'a RenderedFrame),
    Audio(&'a AudioBuffer),
}

impl MediaSample<'_> {
    /// Short tag for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            MediaSample::Frame(_) => "frame",
            MediaSample::Audio(_) => "audio",
        }
    }
}

// =============================================================================
// Renderer Trait
// =============================================================================

/// External frame/audio producer.
///
/// Implementations are black boxes to the pipeline: a GPU scene-graph
/// evaluator, a test stub, or a remote render service all look the same from
/// here. Calls for a single job arrive strictly sequentially in presentation
/// order; calls for different jobs may interleave from different workers.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders the composition at `time` and returns the frame
    async fn render_frame(
        &self,
        composition: &Composition,
        time: TimeSec,
    ) -> ExportResult<RenderedFrame>;

    /// Returns audio samples covering `[time, time + window)`
    async fn audio_samples(
        &self,
        composition: &Composition,
        time: TimeSec,
        window: TimeSec,
    ) -> ExportResult<AudioBuffer>;
}
