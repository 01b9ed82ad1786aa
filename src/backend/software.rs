//! Software Encoder Backend
//!
//! CPU-only fallback backend whose sessions deflate-compress raw sample
//! payloads into self-contained chunks. It is the default backend in tests
//! and on hosts with no platform encoder integration; real hardware backends
//! implement the same traits outside this crate.

use std::io::Write;

use async_trait::async_trait;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::debug;

use super::{
    AudioEncoderConfig, EncodedChunk, EncoderBackend, EncoderSession, LatencyMode,
    VideoEncoderConfig,
};
use crate::capability::HardwareAcceleration;
use crate::error::{ExportError, ExportResult};
use crate::renderer::MediaSample;
use crate::types::TimeSec;

/// Largest dimension a software session will accept
const MAX_DIMENSION: u32 = 8192;

/// Software-only encoder backend
#[derive(Debug, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    pub fn new() -> Self {
        Self
    }

    fn compression_for(latency: LatencyMode, crf: Option<u8>) -> Compression {
        if latency == LatencyMode::Realtime {
            return Compression::fast();
        }
        match crf {
            // Low CRF asks for maximum quality; spend the extra CPU
            Some(crf) if crf <= 18 => Compression::best(),
            _ => Compression::default(),
        }
    }
}

impl EncoderBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn supports_video_config(&self, config: &VideoEncoderConfig) -> bool {
        config.width > 0
            && config.height > 0
            && config.width <= MAX_DIMENSION
            && config.height <= MAX_DIMENSION
            && config.frame_rate > 0.0
            && config.frame_rate.is_finite()
            && config.keyframe_interval > 0
    }

    fn supports_audio_config(&self, config: &AudioEncoderConfig) -> bool {
        (8_000..=192_000).contains(&config.sample_rate) && (1..=8).contains(&config.channels)
    }

    fn hardware_capabilities(&self) -> Option<HardwareAcceleration> {
        // Authoritative: this backend never touches dedicated silicon.
        Some(HardwareAcceleration::unavailable())
    }

    fn open_video(&self, config: &VideoEncoderConfig) -> ExportResult<Box<dyn EncoderSession>> {
        if !self.supports_video_config(config) {
            return Err(ExportError::EncoderInitFailed(format!(
                "software backend rejected video config {}x{} @ {} fps",
                config.width, config.height, config.frame_rate
            )));
        }

        debug!(
            codec = ?config.codec,
            width = config.width,
            height = config.height,
            "opening software video session"
        );

        Ok(Box::new(DeflateVideoSession {
            compression: Self::compression_for(config.latency, config.crf),
            frame_duration: 1.0 / config.frame_rate,
        }))
    }

    fn open_audio(&self, config: &AudioEncoderConfig) -> ExportResult<Box<dyn EncoderSession>> {
        if !self.supports_audio_config(config) {
            return Err(ExportError::EncoderInitFailed(format!(
                "software backend rejected audio config {} Hz / {} ch",
                config.sample_rate, config.channels
            )));
        }

        debug!(codec = ?config.codec, sample_rate = config.sample_rate, "opening software audio session");

        Ok(Box::new(DeflateAudioSession {
            compression: Compression::default(),
        }))
    }
}

fn deflate(data: &[u8], compression: Compression) -> ExportResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), compression);
    encoder
        .write_all(data)
        .map_err(|e| ExportError::Internal(format!("deflate failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| ExportError::Internal(format!("deflate failed: {e}")))
}

/// Video session producing one self-contained chunk per frame
struct DeflateVideoSession {
    compression: Compression,
    frame_duration: TimeSec,
}

#[async_trait]
impl EncoderSession for DeflateVideoSession {
    async fn encode(
        &mut self,
        sample: MediaSample<'_>,
        timestamp: TimeSec,
        force_key: bool,
    ) -> ExportResult<Vec<EncodedChunk>> {
        let frame = match sample {
            MediaSample::Frame(frame) => frame,
            other => {
                return Err(ExportError::Internal(format!(
                    "video session fed a {} sample",
                    other.kind()
                )))
            }
        };

        if !frame.is_well_formed() {
            return Err(ExportError::Internal(format!(
                "frame buffer length {} does not match {:?} {}x{}",
                frame.data.len(),
                frame.format,
                frame.width,
                frame.height
            )));
        }

        let data = deflate(&frame.data, self.compression)?;
        Ok(vec![EncodedChunk {
            data,
            timestamp,
            duration: self.frame_duration,
            is_key: force_key,
        }])
    }

    async fn flush(&mut self) -> ExportResult<Vec<EncodedChunk>> {
        // Every chunk is emitted eagerly; nothing is held back.
        Ok(Vec::new())
    }
}

/// Audio session packing one chunk per sample window
struct DeflateAudioSession {
    compression: Compression,
}

#[async_trait]
impl EncoderSession for DeflateAudioSession {
    async fn encode(
        &mut self,
        sample: MediaSample<'_>,
        timestamp: TimeSec,
        _force_key: bool,
    ) -> ExportResult<Vec<EncodedChunk>> {
        let buffer = match sample {
            MediaSample::Audio(buffer) => buffer,
            other => {
                return Err(ExportError::Internal(format!(
                    "audio session fed a {} sample",
                    other.kind()
                )))
            }
        };

        // Interleave planar channels before compression
        let frames = buffer.frame_count();
        let mut interleaved = Vec::with_capacity(frames * buffer.channel_count() * 4);
        for frame in 0..frames {
            for channel in &buffer.channels {
                interleaved.extend_from_slice(&channel[frame].to_le_bytes());
            }
        }

        let data = deflate(&interleaved, self.compression)?;
        Ok(vec![EncodedChunk {
            data,
            timestamp,
            duration: buffer.duration(),
            is_key: true,
        }])
    }

    async fn flush(&mut self) -> ExportResult<Vec<EncodedChunk>> {
        Ok(Vec::new())
    }
}
