//! Export Error Definitions
//!
//! Defines the error taxonomy used throughout the export pipeline. Every
//! public operation returns a structured error rather than panicking across
//! the library boundary; each variant maps to a stable code string so
//! callers can branch without matching on message text.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formats::ExportFormat;
use crate::jobs::JobStatus;
use crate::types::{Frame, JobId};

/// Export pipeline error types
#[derive(Error, Debug)]
pub enum ExportError {
    // =========================================================================
    // Initialization Errors (non-fatal to the pipeline, trigger degrade)
    // =========================================================================
    #[error("Codec unavailable for format: {0:?}")]
    CodecUnavailable(ExportFormat),

    #[error("Encoder initialization failed: {0}")]
    EncoderInitFailed(String),

    // =========================================================================
    // Job Reference Errors (caller mistakes, never auto-retried)
    // =========================================================================
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job {job_id} is not completed (status: {status})")]
    JobNotCompleted { job_id: JobId, status: JobStatus },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    // =========================================================================
    // Per-Frame Encode Errors (fatal to the whole job)
    // =========================================================================
    #[error("Frame {frame} render failed: {detail}")]
    FrameRenderFailed { frame: Frame, detail: String },

    #[error("Frame {frame} encode failed: {detail}")]
    FrameEncodeFailed { frame: Frame, detail: String },

    #[error("Frame {frame} exceeded the {deadline_ms} ms encode deadline")]
    FrameDeadlineExceeded { frame: Frame, deadline_ms: u64 },

    #[error("Encoder flush failed: {0}")]
    FlushFailed(String),

    // =========================================================================
    // Encoder Contract Errors
    // =========================================================================
    #[error("No encoded data available")]
    NoEncodedData,

    #[error("Encoder already finalized")]
    EncoderFinalized,

    // =========================================================================
    // Resource Exhaustion (transient, caller-retryable)
    // =========================================================================
    #[error("No idle workers available")]
    NoWorkersAvailable,

    #[error("Job queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    // =========================================================================
    // Validation Errors (informational, non-blocking)
    // =========================================================================
    #[error("Quality validation failed: {}", failed.join(", "))]
    QualityValidationFailed { failed: Vec<String> },

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Invalid export options: {0}")]
    InvalidOptions(String),

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Export pipeline result type
pub type ExportResult<T> = Result<T, ExportError>;

impl ExportError {
    /// Stable code string for this error class
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::CodecUnavailable(_) => "CODEC_UNAVAILABLE",
            ExportError::EncoderInitFailed(_) => "ENCODER_INIT_FAILED",
            ExportError::JobNotFound(_) => "JOB_NOT_FOUND",
            ExportError::JobNotCompleted { .. } => "JOB_NOT_COMPLETED",
            ExportError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ExportError::FrameRenderFailed { .. } => "FRAME_RENDER_FAILED",
            ExportError::FrameEncodeFailed { .. } => "FRAME_ENCODE_FAILED",
            ExportError::FrameDeadlineExceeded { .. } => "FRAME_DEADLINE_EXCEEDED",
            ExportError::FlushFailed(_) => "FLUSH_FAILED",
            ExportError::NoEncodedData => "NO_ENCODED_DATA",
            ExportError::EncoderFinalized => "ENCODER_FINALIZED",
            ExportError::NoWorkersAvailable => "NO_WORKERS_AVAILABLE",
            ExportError::QueueFull { .. } => "QUEUE_FULL",
            ExportError::QualityValidationFailed { .. } => "QUALITY_VALIDATION_FAILED",
            ExportError::InvalidOptions(_) => "INVALID_OPTIONS",
            ExportError::DestinationExists(_) => "DESTINATION_EXISTS",
            ExportError::Io(_) => "IO_ERROR",
            ExportError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether a caller may retry the operation unchanged
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExportError::NoWorkersAvailable | ExportError::QueueFull { .. }
        )
    }
}

/// Structured error value attached to a failed job record.
///
/// Stays readable on the job until the job is removed, so callers can
/// inspect failures long after processing has stopped.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    /// Stable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Optional diagnostic trace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl JobError {
    /// Attaches a diagnostic trace
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

impl From<&ExportError> for JobError {
    fn from(error: &ExportError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            trace: None,
        }
    }
}
