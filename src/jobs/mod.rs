//! Export Job Model
//!
//! Job records, the authoritative status state machine, per-frame progress,
//! and the artifact a completed job hands back for muxing.

mod queue;
pub mod worker;

pub use queue::JobQueue;
pub use worker::{EncodeWorker, WorkerPool, MAX_WORKERS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encoder::EncodedBlob;
use crate::error::{ExportError, ExportResult, JobError};
use crate::formats::{ExportFormat, ExportOptions};
use crate::types::{Composition, Frame, JobId, Resolution, TimeSec};

// =============================================================================
// Priority
// =============================================================================

/// Job scheduling priority
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
}

// =============================================================================
// Status and Phase
// =============================================================================

/// Job status state machine.
///
/// Transitions are monotonic: `Queued -> Running -> {Completed, Failed,
/// Cancelled}`, plus `Queued -> Cancelled` for jobs cancelled before they
/// start. Terminal states are never left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `to` is a legal next state from `self`
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// Observational phase within a running job.
///
/// Reported in progress snapshots for UIs; control flow is gated by
/// [`JobStatus`] alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Initializing,
    Encoding,
    Finalizing,
    Completed,
    Failed,
}

// =============================================================================
// Progress
// =============================================================================

/// Per-frame progress for one job. Single writer: the owning worker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    /// Frame currently being processed (monotone non-decreasing)
    pub current_frame: Frame,
    /// Total frames, fixed at job creation
    pub total_frames: Frame,
    /// Observational phase
    pub phase: JobPhase,
}

impl ExportProgress {
    pub fn new(total_frames: Frame) -> Self {
        Self {
            current_frame: 0,
            total_frames,
            phase: JobPhase::Initializing,
        }
    }

    /// Completion percentage in `[0, 100]`
    pub fn percent(&self) -> f32 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}

// =============================================================================
// Export Job
// =============================================================================

/// One export job record
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    /// Monotonically increasing id; also the queue's creation-order tie-break
    pub id: JobId,
    /// Composition being exported
    pub composition: Composition,
    /// Caller options, validated at creation
    pub options: ExportOptions,
    /// Per-frame progress, written only by the owning worker
    pub progress: ExportProgress,
    /// Status state machine
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Structured error, set when the job fails
    pub error: Option<JobError>,
}

impl ExportJob {
    /// Creates a queued job, fixing `total_frames = ceil(duration * fps)`
    pub fn new(id: JobId, composition: Composition, options: ExportOptions) -> Self {
        let (start, end) = options.time_range(&composition);
        let frame_rate = options.frame_rate.unwrap_or(composition.frame_rate);
        let total_frames = ((end - start) * frame_rate).ceil() as Frame;

        Self {
            id,
            composition,
            options,
            progress: ExportProgress::new(total_frames),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn total_frames(&self) -> Frame {
        self.progress.total_frames
    }

    /// Effective frame rate for this job
    pub fn frame_rate(&self) -> f64 {
        self.options
            .frame_rate
            .unwrap_or(self.composition.frame_rate)
    }

    /// Effective output resolution for this job
    pub fn resolution(&self) -> Resolution {
        self.options
            .resolution
            .unwrap_or_else(|| self.composition.resolution())
    }

    /// Export range start in composition time
    pub fn start_time(&self) -> TimeSec {
        self.options.start_time.unwrap_or(0.0)
    }

    pub fn format(&self) -> ExportFormat {
        self.options.format
    }

    pub fn priority(&self) -> Priority {
        self.options.priority
    }

    pub fn hardware_acceleration(&self) -> bool {
        self.options.hardware_acceleration
    }

    /// Moves the state machine forward, stamping timestamps.
    ///
    /// Rejects anything but the legal monotonic transitions; terminal states
    /// are never left.
    pub fn transition(&mut self, to: JobStatus) -> ExportResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(ExportError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        match to {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            JobStatus::Queued => {}
        }

        self.status = to;
        Ok(())
    }

    /// Records a failure on the job record and moves it to `Failed`
    pub fn fail(&mut self, error: &ExportError) {
        self.error = Some(JobError::from(error));
        if self.status.can_transition_to(JobStatus::Failed) {
            let _ = self.transition(JobStatus::Failed);
        }
        self.progress.phase = JobPhase::Failed;
    }
}

// =============================================================================
// Export Artifact
// =============================================================================

/// Encoded output of a completed job, ready for external muxing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub job_id: JobId,
    pub format: ExportFormat,
    /// Encoded video stream, absent when the video path was degraded away
    pub video: Option<EncodedBlob>,
    /// Encoded audio stream, absent for video-only jobs
    pub audio: Option<EncodedBlob>,
    pub total_frames: Frame,
    /// Wall-clock encoding time in seconds
    pub encoding_time_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job(duration: f64, frame_rate: f64) -> ExportJob {
        let composition = Composition::new("comp_001", duration, frame_rate, 1920, 1080);
        ExportJob::new(1, composition, ExportOptions::default())
    }

    #[test]
    fn test_total_frames_is_ceiling() {
        assert_eq!(test_job(10.0, 30.0).total_frames(), 300);
        assert_eq!(test_job(5.0, 29.97).total_frames(), 150);
        assert_eq!(test_job(1.0, 30.0).total_frames(), 30);
        // 0.033s at 30fps still produces one frame
        assert_eq!(test_job(0.033, 30.0).total_frames(), 1);
    }

    #[test]
    fn test_total_frames_honors_range_and_rate_overrides() {
        let composition = Composition::new("comp_001", 10.0, 30.0, 1920, 1080);
        let options = ExportOptions {
            start_time: Some(2.0),
            end_time: Some(6.0),
            frame_rate: Some(60.0),
            ..Default::default()
        };
        let job = ExportJob::new(1, composition, options);

        assert_eq!(job.total_frames(), 240);
        assert_eq!(job.frame_rate(), 60.0);
        assert_eq!(job.start_time(), 2.0);
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        let mut job = test_job(1.0, 30.0);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.started_at.is_none());

        job.transition(JobStatus::Running).unwrap();
        assert!(job.started_at.is_some());

        job.transition(JobStatus::Completed).unwrap();
        assert!(job.completed_at.is_some());

        // Terminal states are never left
        let err = job.transition(JobStatus::Running).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_queued_can_cancel_directly() {
        let mut job = test_job(1.0, 30.0);
        job.transition(JobStatus::Cancelled).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut job = test_job(1.0, 30.0);
        // Queued cannot complete or fail without running first
        assert!(job.transition(JobStatus::Completed).is_err());
        assert!(job.transition(JobStatus::Failed).is_err());

        job.transition(JobStatus::Running).unwrap();
        assert!(job.transition(JobStatus::Running).is_err());
        assert!(job.transition(JobStatus::Queued).is_err());
    }

    #[test]
    fn test_fail_records_structured_error() {
        let mut job = test_job(1.0, 30.0);
        job.transition(JobStatus::Running).unwrap();
        job.fail(&ExportError::FrameEncodeFailed {
            frame: 3,
            detail: "session died".to_string(),
        });

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress.phase, JobPhase::Failed);
        let error = job.error.as_ref().unwrap();
        assert_eq!(error.code, "FRAME_ENCODE_FAILED");
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_progress_percent() {
        let mut progress = ExportProgress::new(300);
        assert_eq!(progress.percent(), 0.0);

        progress.current_frame = 150;
        assert!((progress.percent() - 50.0).abs() < f32::EPSILON);

        assert_eq!(ExportProgress::new(0).percent(), 0.0);
    }
}
