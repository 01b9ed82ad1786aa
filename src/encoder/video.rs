//! Video Encoder
//!
//! Drives one video encoding session for one job: derives the session
//! configuration from the job's format and quality, feeds frames in
//! presentation order, forces the fixed keyframe cadence, and buffers the
//! resulting chunks until finalization.

use tracing::debug;

use super::EncodedBlob;
use crate::backend::{EncodedChunk, EncoderBackend, EncoderSession, LatencyMode, VideoEncoderConfig};
use crate::error::{ExportError, ExportResult};
use crate::jobs::ExportJob;
use crate::renderer::{MediaSample, RenderedFrame};
use crate::types::{Frame, TimeSec};

/// Fixed forced-keyframe cadence in encoded frames.
///
/// A fixed GOP regardless of frame rate or scene content; adaptive keyframe
/// placement is a job for a smarter backend.
pub const KEYFRAME_INTERVAL: u32 = 30;

/// Per-job video encoder owning one backend session
pub struct VideoEncoder {
    config: VideoEncoderConfig,
    session: Box<dyn EncoderSession>,
    media_type: String,
    chunks: Vec<EncodedChunk>,
    frames_encoded: Frame,
    finalized: bool,
}

impl VideoEncoder {
    /// Derives a session configuration from the job and opens the session
    pub fn initialize(backend: &dyn EncoderBackend, job: &ExportJob) -> ExportResult<Self> {
        let resolution = job.resolution();
        let config = VideoEncoderConfig {
            codec: job.format().video_codec(),
            width: resolution.width,
            height: resolution.height,
            frame_rate: job.frame_rate(),
            bitrate: job.options.quality.video_bitrate(),
            crf: job.options.quality.crf(),
            keyframe_interval: KEYFRAME_INTERVAL,
            latency: LatencyMode::Quality,
            hardware_acceleration: job.hardware_acceleration(),
        };

        debug!(
            job_id = job.id,
            codec = ?config.codec,
            bitrate = config.bitrate,
            "initializing video encoder"
        );

        let session = backend.open_video(&config)?;
        Ok(Self {
            config,
            media_type: job.format().container().media_type().to_string(),
            session,
            chunks: Vec::new(),
            frames_encoded: 0,
            finalized: false,
        })
    }

    /// Encodes one frame at the given presentation time.
    ///
    /// Chunks arrive in presentation order; callers must feed monotonic
    /// timestamps, which are not re-validated here.
    pub async fn encode_frame(&mut self, frame: &RenderedFrame, time: TimeSec) -> ExportResult<()> {
        if self.finalized {
            return Err(ExportError::EncoderFinalized);
        }

        let force_key = self.frames_encoded % self.config.keyframe_interval as Frame == 0;
        let chunks = self
            .session
            .encode(MediaSample::Frame(frame), time, force_key)
            .await?;

        self.chunks.extend(chunks);
        self.frames_encoded += 1;
        Ok(())
    }

    /// Flushes the session and ends the encoder; no encode calls are valid
    /// afterwards
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

        debug!(
            frames = self.frames_encoded,
            chunks = self.chunks.len(),
            "video encoder finalized"
        );
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

    pub fn frames_encoded(&self) -> Frame {
        self.frames_encoded
    }

    pub fn config(&self) -> &VideoEncoderConfig {
        &self.config
    }
}
