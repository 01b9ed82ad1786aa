//! Encode Workers
//!
//! A bounded pool of workers, each owning at most one active job and the
//! encoder instances for it. The per-frame loop is strictly sequential
//! within a job: frame `i + 1` never starts before frame `i`'s encode call
//! returns, because sessions require monotonic presentation order and are
//! not reentrant. Cancellation is checked exactly once per frame boundary,
//! so it takes effect within one frame's worth of latency.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ExportArtifact, ExportJob, JobPhase, JobStatus};
use crate::backend::EncoderBackend;
use crate::capability::CapabilitySet;
use crate::encoder::{AudioEncoder, EncodedBlob, VideoEncoder};
use crate::error::{ExportError, ExportResult};
use crate::formats::Destination;
use crate::orchestrator::Registry;
use crate::progress::ProgressTracker;
use crate::renderer::Renderer;
use crate::types::{Frame, JobId, TimeSec, WorkerId};

/// Hard cap on pool size, independent of host parallelism
pub const MAX_WORKERS: usize = 8;

// =============================================================================
// Worker Context
// =============================================================================

/// Shared services a worker task needs while running a job
pub(crate) struct WorkerContext {
    pub registry: Arc<Mutex<Registry>>,
    pub renderer: Arc<dyn Renderer>,
    pub backend: Arc<dyn EncoderBackend>,
    pub capabilities: Arc<CapabilitySet>,
    pub tracker: Arc<ProgressTracker>,
    /// Deadline for one frame's render + encode step
    pub frame_deadline: Duration,
}

// =============================================================================
// Encode Worker
// =============================================================================

/// One worker slot: at most one active job, exclusive ownership of its
/// encoder instances
pub struct EncodeWorker {
    id: WorkerId,
    current: Mutex<Option<JobId>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EncodeWorker {
    fn new(id: WorkerId) -> Self {
        Self {
            id,
            current: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Job currently assigned to this worker, if any
    pub fn current_job(&self) -> Option<JobId> {
        *self.current.lock().unwrap()
    }

    /// Atomically claims the worker for a job; false if it is busy
    pub(crate) fn try_claim(&self, job_id: JobId) -> bool {
        let mut current = self.current.lock().unwrap();
        if current.is_some() {
            return false;
        }
        *current = Some(job_id);
        true
    }

    pub(crate) fn release(&self) {
        *self.current.lock().unwrap() = None;
    }

    /// Spawns the job task. The worker must already be claimed for this job.
    pub(crate) fn start_job(self: &Arc<Self>, job: ExportJob, ctx: Arc<WorkerContext>) {
        let worker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            worker.run_job(job, ctx).await;
        });
        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Awaits the current job task, if one was spawned
    pub(crate) async fn wait_idle(&self) {
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn run_job(&self, mut job: ExportJob, ctx: Arc<WorkerContext>) {
        let job_id = job.id;
        let started = Instant::now();
        info!(worker = self.id, job_id, format = ?job.format(), "starting export job");

        set_phase(&ctx, job_id, JobPhase::Initializing);

        // Resolve which streams this job can produce. Missing per-stream
        // capability degrades to omitting the stream; a job with nothing to
        // produce fails.
        let video_supported = ctx.capabilities.supports(job.format());
        if !video_supported {
            warn!(job_id, format = ?job.format(), "video codec unavailable, omitting video stream");
        }

        let want_audio = job.options.include_audio
            && job.composition.has_audio
            && job.format().audio_codec().is_some();

        if !video_supported && !want_audio {
            self.fail_job(&ctx, job_id, &ExportError::CodecUnavailable(job.format()));
            return;
        }

        if job.options.hardware_acceleration
            && !ctx.capabilities.is_hardware_accelerated(job.format())
        {
            warn!(job_id, "hardware acceleration requested but unavailable, using software path");
            job.options.hardware_acceleration = false;
        }

        let mut video = if video_supported {
            match VideoEncoder::initialize(ctx.backend.as_ref(), &job) {
                Ok(encoder) => Some(encoder),
                Err(error) => {
                    self.fail_job(&ctx, job_id, &error);
                    return;
                }
            }
        } else {
            None
        };

        let mut audio = if want_audio {
            match AudioEncoder::initialize(ctx.backend.as_ref(), &job) {
                Ok(encoder) => Some(encoder),
                Err(error) if video.is_some() => {
                    warn!(job_id, %error, "audio encoder unavailable, omitting audio stream");
                    None
                }
                Err(error) => {
                    self.fail_job(&ctx, job_id, &error);
                    return;
                }
            }
        } else {
            None
        };

        let total_frames = job.total_frames();
        let frame_rate = job.frame_rate();
        let start_time = job.start_time();
        let window = 1.0 / frame_rate;
        let deadline_ms = ctx.frame_deadline.as_millis() as u64;

        for frame_index in 0..total_frames {
            // The only cancellation checkpoint: once per frame boundary
            let progress = {
                let mut registry = ctx.registry.lock().unwrap();
                let Some(record) = registry.record_mut(job_id) else {
                    warn!(job_id, "job record vanished mid-flight");
                    self.release();
                    return;
                };
                if record.job.status == JobStatus::Cancelled {
                    info!(job_id, frame = frame_index, "cancellation observed, discarding buffered output");
                    self.release();
                    return;
                }
                record.job.progress.current_frame = frame_index;
                record.job.progress.phase = JobPhase::Encoding;
                record.job.progress
            };
            ctx.tracker.notify(job_id, &progress);

            let time = start_time + frame_index as f64 / frame_rate;
            let step = encode_one_frame(
                frame_index,
                time,
                window,
                &job,
                &ctx,
                video.as_mut(),
                audio.as_mut(),
            );

            match tokio::time::timeout(ctx.frame_deadline, step).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    self.fail_job(&ctx, job_id, &error);
                    return;
                }
                Err(_) => {
                    self.fail_job(
                        &ctx,
                        job_id,
                        &ExportError::FrameDeadlineExceeded {
                            frame: frame_index,
                            deadline_ms,
                        },
                    );
                    return;
                }
            }
        }

        set_phase(&ctx, job_id, JobPhase::Finalizing);

        for encoder_result in [
            match video.as_mut() {
                Some(encoder) => encoder.finalize().await,
                None => Ok(()),
            },
            match audio.as_mut() {
                Some(encoder) => encoder.finalize().await,
                None => Ok(()),
            },
        ] {
            if let Err(error) = encoder_result {
                self.fail_job(&ctx, job_id, &error);
                return;
            }
        }

        let video_blob = match video.map(|encoder| encoder.encoded_data()).transpose() {
            Ok(blob) => blob,
            Err(error) => {
                self.fail_job(&ctx, job_id, &error);
                return;
            }
        };
        let audio_blob = match audio.map(|encoder| encoder.encoded_data()).transpose() {
            Ok(blob) => blob,
            Err(error) => {
                self.fail_job(&ctx, job_id, &error);
                return;
            }
        };

        if let Destination::File { path, overwrite } = &job.options.destination {
            if let Err(error) =
                write_outputs(path, *overwrite, video_blob.as_ref(), audio_blob.as_ref()).await
            {
                self.fail_job(&ctx, job_id, &error);
                return;
            }
        }

        let artifact = ExportArtifact {
            job_id,
            format: job.format(),
            video: video_blob,
            audio: audio_blob,
            total_frames,
            encoding_time_sec: started.elapsed().as_secs_f64(),
        };

        self.complete_job(&ctx, job_id, artifact);
        info!(
            worker = self.id,
            job_id,
            frames = total_frames,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "export job completed"
        );
    }

    /// Attaches the error to the job record and releases the worker slot.
    /// Never touches any other job's state.
    fn fail_job(&self, ctx: &WorkerContext, job_id: JobId, error: &ExportError) {
        warn!(worker = self.id, job_id, %error, code = error.code(), "export job failed");

        let progress = {
            let mut registry = ctx.registry.lock().unwrap();
            registry.record_mut(job_id).map(|record| {
                if !record.job.status.is_terminal() {
                    record.job.fail(error);
                } else {
                    debug!(job_id, "job already terminal, keeping existing state");
                }
                record.job.progress
            })
        };
        if let Some(progress) = progress {
            ctx.tracker.notify(job_id, &progress);
        }
        self.release();
    }

    /// Stores the artifact and marks the job completed, unless a cancel won
    /// the race during the final frame
    fn complete_job(&self, ctx: &WorkerContext, job_id: JobId, artifact: ExportArtifact) {
        let progress = {
            let mut registry = ctx.registry.lock().unwrap();
            registry.record_mut(job_id).and_then(|record| {
                if record.job.status == JobStatus::Cancelled {
                    info!(job_id, "cancelled during finalization, discarding output");
                    return None;
                }
                record.job.progress.current_frame = record.job.progress.total_frames;
                record.job.progress.phase = JobPhase::Completed;
                record.artifact = Some(artifact);
                if let Err(error) = record.job.transition(JobStatus::Completed) {
                    warn!(job_id, %error, "unexpected status on completion");
                }
                Some(record.job.progress)
            })
        };
        if let Some(progress) = progress {
            ctx.tracker.notify(job_id, &progress);
        }
        self.release();
    }
}

/// Updates the observational phase without touching control flow
fn set_phase(ctx: &WorkerContext, job_id: JobId, phase: JobPhase) {
    let progress = {
        let mut registry = ctx.registry.lock().unwrap();
        registry.record_mut(job_id).map(|record| {
            record.job.progress.phase = phase;
            record.job.progress
        })
    };
    if let Some(progress) = progress {
        ctx.tracker.notify(job_id, &progress);
    }
}

/// One frame's render + encode step; runs under the per-frame deadline
async fn encode_one_frame(
    frame_index: Frame,
    time: TimeSec,
    window: TimeSec,
    job: &ExportJob,
    ctx: &WorkerContext,
    video: Option<&mut VideoEncoder>,
    audio: Option<&mut AudioEncoder>,
) -> ExportResult<()> {
    if let Some(video) = video {
        let frame = ctx
            .renderer
            .render_frame(&job.composition, time)
            .await
            .map_err(|error| ExportError::FrameRenderFailed {
                frame: frame_index,
                detail: error.to_string(),
            })?;
        video
            .encode_frame(&frame, time)
            .await
            .map_err(|error| encode_error(frame_index, error))?;
    }

    if let Some(audio) = audio {
        let samples = ctx
            .renderer
            .audio_samples(&job.composition, time, window)
            .await
            .map_err(|error| ExportError::FrameRenderFailed {
                frame: frame_index,
                detail: error.to_string(),
            })?;
        audio
            .encode_samples(&samples, time)
            .await
            .map_err(|error| encode_error(frame_index, error))?;
    }

    Ok(())
}

fn encode_error(frame: Frame, error: ExportError) -> ExportError {
    match error {
        already @ ExportError::FrameEncodeFailed { .. } => already,
        other => ExportError::FrameEncodeFailed {
            frame,
            detail: other.to_string(),
        },
    }
}

/// Writes encoded streams to the file destination. The primary stream goes
/// to `path`; when both streams exist the audio lands in a `.audio` sidecar
/// for the external muxer to pick up.
async fn write_outputs(
    path: &Path,
    overwrite: bool,
    video: Option<&EncodedBlob>,
    audio: Option<&EncodedBlob>,
) -> ExportResult<()> {
    let primary = video
        .or(audio)
        .ok_or_else(|| ExportError::Internal("no stream to write".to_string()))?;

    if !overwrite && tokio::fs::try_exists(path).await? {
        return Err(ExportError::DestinationExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, primary.to_bytes()).await?;

    if let (Some(_), Some(audio)) = (video, audio) {
        let sidecar = audio_sidecar_path(path);
        if !overwrite && tokio::fs::try_exists(&sidecar).await? {
            return Err(ExportError::DestinationExists(sidecar));
        }
        tokio::fs::write(&sidecar, audio.to_bytes()).await?;
    }

    Ok(())
}

fn audio_sidecar_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".audio");
    path.with_file_name(name)
}

// =============================================================================
// Worker Pool
// =============================================================================

/// Bounded set of encode workers
pub struct WorkerPool {
    workers: Vec<Arc<EncodeWorker>>,
}

impl WorkerPool {
    /// Creates a pool of `size` workers, clamped to `[1, MAX_WORKERS]`
    pub fn new(size: usize) -> Self {
        let size = size.clamp(1, MAX_WORKERS);
        let workers = (0..size).map(|id| Arc::new(EncodeWorker::new(id))).collect();
        Self { workers }
    }

    /// Pool size derived from host parallelism, capped at [`MAX_WORKERS`]
    pub fn default_size() -> usize {
        num_cpus::get().clamp(1, MAX_WORKERS)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Workers currently running a job
    pub fn busy_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| worker.current_job().is_some())
            .count()
    }

    /// Claims the first idle worker for a job
    pub(crate) fn claim_idle(&self, job_id: JobId) -> Option<Arc<EncodeWorker>> {
        self.workers
            .iter()
            .find(|worker| worker.try_claim(job_id))
            .cloned()
    }

    /// Awaits every spawned job task
    pub(crate) async fn wait_all_idle(&self) {
        for worker in &self.workers {
            worker.wait_idle().await;
        }
    }
}
