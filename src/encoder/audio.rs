//! Audio Encoder
//!
//! Drives one audio encoding session for one job. Audio configuration is
//! fixed at 128 kbps / 48 kHz / stereo independent of the job's quality
//! preset; only an explicit `audio_bitrate` override changes the rate.

use tracing::debug;

use super::EncodedBlob;
use crate::backend::{AudioEncoderConfig, EncodedChunk, EncoderBackend, EncoderSession};
use crate::error::{ExportError, ExportResult};
use crate::jobs::ExportJob;
use crate::renderer::{AudioBuffer, MediaSample};
use crate::types::TimeSec;

/// Default audio bitrate in bits per second
pub const DEFAULT_AUDIO_BITRATE: u32 = 128_000;
/// Fixed output sample rate
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Fixed output channel count (stereo)
pub const AUDIO_CHANNELS: u16 = 2;

/// Per-job audio encoder owning one backend session
pub struct AudioEncoder {
    config: AudioEncoderConfig,
    session: Box<dyn EncoderSession>,
    media_type: String,
    chunks: Vec<EncodedChunk>,
    buffers_encoded: u64,
    finalized: bool,
}

impl std::fmt::Debug for AudioEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEncoder")
            .field("config", &self.config)
            .field("media_type", &self.media_type)
            .field("chunks", &self.chunks)
            .field("buffers_encoded", &self.buffers_encoded)
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

impl AudioEncoder {
    /// Opens a session for the job's container audio codec.
    ///
    /// Returns an error for containers without an audio stream; callers
    /// decide audio presence before constructing the encoder.
    pub fn initialize(backend: &dyn EncoderBackend, job: &ExportJob) -> ExportResult<Self> {
        let codec = job.format().audio_codec().ok_or_else(|| {
            ExportError::EncoderInitFailed(format!(
                "container {:?} carries no audio stream",
                job.format().container()
            ))
        })?;

        let config = AudioEncoderConfig {
            codec,
            bitrate: job.options.audio_bitrate.unwrap_or(DEFAULT_AUDIO_BITRATE),
            sample_rate: AUDIO_SAMPLE_RATE,
            channels: AUDIO_CHANNELS,
        };

        debug!(job_id = job.id, codec = ?config.codec, bitrate = config.bitrate, "initializing audio encoder");

        let session = backend.open_audio(&config)?;
        Ok(Self {
            config,
            media_type: job.format().container().media_type().to_string(),
            session,
            chunks: Vec::new(),
            buffers_encoded: 0,
            finalized: false,
        })
    }

    /// Encodes one window of samples at the given presentation time
    pub async fn encode_samples(
        &mut self,
        samples: &AudioBuffer,
        time: TimeSec,
    ) -> ExportResult<()> {
        if self.finalized {
            return Err(ExportError::EncoderFinalized);
        }

        let chunks = self
            .session
            .encode(MediaSample::Audio(samples), time, false)
            .await?;

        self.chunks.extend(chunks);
        self.buffers_encoded += 1;
        Ok(())
    }

    /// Flushes the session; no encode calls are valid afterwards
    pub async fn finalize(&mut self) -> ExportResult<()> {
        if self.finalized {
            return Ok(());
        }

        let flushed = self
            .session
            .flush()
            .await
            .map_err(|e| ExportError::FlushFailed(e.to_string()))?;
        self.chunks.extend(flushed);
        self.finalized = true;
        Ok(())
    }

    /// Buffered chunks as one media-typed blob
    pub fn encoded_data(&self) -> ExportResult<EncodedBlob> {
        if self.chunks.is_empty() {
            return Err(ExportError::NoEncodedData);
        }
        Ok(EncodedBlob {
            media_type: self.media_type.clone(),
            chunks: self.chunks.clone(),
        })
    }

    pub fn config(&self) -> &AudioEncoderConfig {
        &self.config
    }
}
