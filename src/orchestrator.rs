//! Export Orchestrator
//!
//! The public surface of the pipeline: job creation, the priority queue,
//! assignment to idle workers, cancellation, snapshot reads, and one-shot
//! result retrieval. All job state lives in a single mutex-guarded registry
//! addressed by job id; workers hold the registry through their shared
//! context and follow a single-writer discipline (a running job's progress
//! is written only by its owning worker, queue membership only by the
//! orchestrator).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::EncoderBackend;
use crate::capability::{CapabilityProbe, CapabilitySet};
use crate::error::{ExportError, ExportResult};
use crate::formats::ExportOptions;
use crate::jobs::worker::WorkerContext;
use crate::jobs::{ExportArtifact, ExportJob, ExportProgress, JobQueue, JobStatus, WorkerPool};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::renderer::Renderer;
use crate::types::{Composition, JobId};

// =============================================================================
// Configuration
// =============================================================================

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of encode workers; clamped to `[1, MAX_WORKERS]`
    pub max_workers: usize,
    /// Maximum queued (not yet started) jobs
    pub max_queue_size: usize,
    /// Deadline for one frame's render + encode step
    pub frame_deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: WorkerPool::default_size(),
            max_queue_size: 256,
            frame_deadline: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// One job's registry entry
pub(crate) struct JobRecord {
    pub job: ExportJob,
    /// Encoded output, set by the owning worker on completion
    pub artifact: Option<ExportArtifact>,
}

/// All job state, guarded by one mutex and addressed by job id
pub(crate) struct Registry {
    jobs: HashMap<JobId, JobRecord>,
    queue: JobQueue,
    next_id: JobId,
}

impl Registry {
    fn new(queue_capacity: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            queue: JobQueue::new(queue_capacity),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn record_mut(&mut self, job_id: JobId) -> Option<&mut JobRecord> {
        self.jobs.get_mut(&job_id)
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Explicitly constructed, ownership-passed export service
pub struct ExportOrchestrator {
    registry: Arc<Mutex<Registry>>,
    pool: WorkerPool,
    capabilities: Arc<CapabilitySet>,
    tracker: Arc<ProgressTracker>,
    ctx: Arc<WorkerContext>,
}

impl ExportOrchestrator {
    /// Creates an orchestrator with default configuration, probing the
    /// backend's capabilities once
    pub fn new(renderer: Arc<dyn Renderer>, backend: Arc<dyn EncoderBackend>) -> Self {
        Self::with_config(PipelineConfig::default(), renderer, backend)
    }

    /// Creates an orchestrator with explicit configuration
    pub fn with_config(
        config: PipelineConfig,
        renderer: Arc<dyn Renderer>,
        backend: Arc<dyn EncoderBackend>,
    ) -> Self {
        let capabilities = Arc::new(CapabilityProbe::probe(backend.as_ref()));
        let tracker = Arc::new(ProgressTracker::new());
        let registry = Arc::new(Mutex::new(Registry::new(config.max_queue_size)));
        let pool = WorkerPool::new(config.max_workers);

        let ctx = Arc::new(WorkerContext {
            registry: Arc::clone(&registry),
            renderer,
            backend,
            capabilities: Arc::clone(&capabilities),
            tracker: Arc::clone(&tracker),
            frame_deadline: config.frame_deadline,
        });

        info!(
            workers = pool.len(),
            usable_formats = capabilities.capabilities.len(),
            "export orchestrator ready"
        );

        Self {
            registry,
            pool,
            capabilities,
            tracker,
            ctx,
        }
    }

    /// Probed codec capabilities, cached for this orchestrator's lifetime
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn worker_count(&self) -> usize {
        self.pool.len()
    }

    /// Workers currently running a job
    pub fn busy_workers(&self) -> usize {
        self.pool.busy_count()
    }

    // =========================================================================
    // Job Lifecycle
    // =========================================================================

    /// Validates options, assigns an id, and enqueues a new job.
    ///
    /// No encoding starts until [`start_export`](Self::start_export).
    pub fn create_export_job(
        &self,
        composition: Composition,
        options: ExportOptions,
    ) -> ExportResult<ExportJob> {
        options.validate(&composition)?;

        let mut registry = self.registry.lock().unwrap();
        let id = registry.allocate_id();
        let job = ExportJob::new(id, composition, options);

        registry.queue.push(id, job.priority())?;
        registry.jobs.insert(
            id,
            JobRecord {
                job: job.clone(),
                artifact: None,
            },
        );

        info!(
            job_id = id,
            format = ?job.format(),
            priority = ?job.priority(),
            total_frames = job.total_frames(),
            "export job created"
        );
        Ok(job)
    }

    /// Dequeues a specific job and assigns it to an idle worker.
    ///
    /// With no idle worker the job stays queued and the transient
    /// `NO_WORKERS_AVAILABLE` error is returned; the caller may retry.
    pub fn start_export(&self, job_id: JobId) -> ExportResult<()> {
        let (worker, job) = {
            let mut registry = self.registry.lock().unwrap();
            let record = registry
                .jobs
                .get(&job_id)
                .ok_or(ExportError::JobNotFound(job_id))?;
            if record.job.status != JobStatus::Queued {
                return Err(ExportError::InvalidTransition {
                    from: record.job.status,
                    to: JobStatus::Running,
                });
            }

            // Claim a worker before dequeueing so a full pool leaves the
            // job queued rather than running-but-unassigned.
            let Some(worker) = self.pool.claim_idle(job_id) else {
                debug!(job_id, "no idle workers, job stays queued");
                return Err(ExportError::NoWorkersAvailable);
            };

            registry.queue.remove(job_id);
            let record = registry
                .jobs
                .get_mut(&job_id)
                .ok_or(ExportError::JobNotFound(job_id))?;
            if let Err(error) = record.job.transition(JobStatus::Running) {
                worker.release();
                return Err(error);
            }
            (worker, record.job.clone())
        };

        info!(job_id, worker = worker.id(), "export started");
        worker.start_job(job, Arc::clone(&self.ctx));
        Ok(())
    }

    /// Dequeues the highest-priority job and assigns it to an idle worker.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    pub fn start_next_export(&self) -> ExportResult<Option<JobId>> {
        let job_id = {
            let registry = self.registry.lock().unwrap();
            registry.queue.peek()
        };
        match job_id {
            Some(job_id) => self.start_export(job_id).map(|_| Some(job_id)),
            None => Ok(None),
        }
    }

    /// Cancels a job.
    ///
    /// Queued jobs leave the queue immediately; running jobs stop
    /// cooperatively at the owning worker's next frame boundary, which
    /// discards all buffered output. Cancelling an already-terminal job is a
    /// no-op.
    pub fn cancel_export(&self, job_id: JobId) -> ExportResult<()> {
        let mut registry = self.registry.lock().unwrap();
        let status = registry
            .jobs
            .get(&job_id)
            .map(|record| record.job.status)
            .ok_or(ExportError::JobNotFound(job_id))?;

        match status {
            JobStatus::Queued => {
                registry.queue.remove(job_id);
                if let Some(record) = registry.jobs.get_mut(&job_id) {
                    record.job.transition(JobStatus::Cancelled)?;
                }
                info!(job_id, "queued export cancelled");
            }
            JobStatus::Running => {
                if let Some(record) = registry.jobs.get_mut(&job_id) {
                    record.job.transition(JobStatus::Cancelled)?;
                }
                info!(job_id, "running export cancelled, worker will stop at the next frame");
            }
            status if status.is_terminal() => {
                debug!(job_id, %status, "cancel on terminal job is a no-op");
            }
            _ => {}
        }
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Non-blocking progress snapshot; `None` for unknown ids
    pub fn export_progress(&self, job_id: JobId) -> Option<ExportProgress> {
        let registry = self.registry.lock().unwrap();
        registry.jobs.get(&job_id).map(|record| record.job.progress)
    }

    /// Non-blocking status snapshot; `None` for unknown ids
    pub fn export_status(&self, job_id: JobId) -> Option<JobStatus> {
        let registry = self.registry.lock().unwrap();
        registry.jobs.get(&job_id).map(|record| record.job.status)
    }

    /// Full job snapshot, including any recorded error
    pub fn job(&self, job_id: JobId) -> Option<ExportJob> {
        let registry = self.registry.lock().unwrap();
        registry.jobs.get(&job_id).map(|record| record.job.clone())
    }

    /// Ids still waiting in the queue
    pub fn queued_jobs(&self) -> Vec<JobId> {
        self.registry.lock().unwrap().queue.ids()
    }

    /// Snapshots of currently running jobs
    pub fn active_jobs(&self) -> Vec<ExportJob> {
        let registry = self.registry.lock().unwrap();
        registry
            .jobs
            .values()
            .filter(|record| record.job.status == JobStatus::Running)
            .map(|record| record.job.clone())
            .collect()
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Retrieves a completed job's encoded output and removes the job.
    ///
    /// One-shot and destructive: a second call for the same id reports
    /// `JOB_NOT_FOUND`.
    pub fn export_result(&self, job_id: JobId) -> ExportResult<ExportArtifact> {
        let mut registry = self.registry.lock().unwrap();
        let record = registry
            .jobs
            .get(&job_id)
            .ok_or(ExportError::JobNotFound(job_id))?;

        if record.job.status != JobStatus::Completed {
            return Err(ExportError::JobNotCompleted {
                job_id,
                status: record.job.status,
            });
        }

        let record = registry
            .jobs
            .remove(&job_id)
            .ok_or(ExportError::JobNotFound(job_id))?;
        record
            .artifact
            .ok_or_else(|| ExportError::Internal(format!("completed job {job_id} has no artifact")))
    }

    // =========================================================================
    // Progress Callbacks
    // =========================================================================

    /// Registers a progress callback for a job, replacing any previous one
    pub fn on_progress(&self, job_id: JobId, callback: ProgressCallback) {
        self.tracker.register(job_id, callback);
    }

    /// Removes a job's progress callback
    pub fn remove_progress_callback(&self, job_id: JobId) -> bool {
        self.tracker.remove(job_id)
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Cancels every queued and running job, then waits for the workers to
    /// go idle
    pub async fn shutdown(&self) {
        let job_ids: Vec<JobId> = {
            let registry = self.registry.lock().unwrap();
            registry
                .jobs
                .values()
                .filter(|record| !record.job.status.is_terminal())
                .map(|record| record.job.id)
                .collect()
        };

        for job_id in job_ids {
            let _ = self.cancel_export(job_id);
        }
        self.pool.wait_all_idle().await;
        info!("export orchestrator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        AudioEncoderConfig, EncoderSession, SoftwareBackend, VideoEncoderConfig,
    };
    use crate::capability::HardwareAcceleration;
    use crate::formats::{Destination, ExportFormat, Quality, QualityPreset};
    use crate::jobs::Priority;
    use crate::renderer::{AudioBuffer, PixelFormat, RenderedFrame};
    use crate::types::TimeSec;
    use async_trait::async_trait;

    /// Deterministic renderer producing flat frames and silence, with an
    /// optional per-frame delay to keep jobs running long enough to cancel
    struct StubRenderer {
        frame_delay: Duration,
    }

    impl StubRenderer {
        fn fast() -> Arc<Self> {
            Arc::new(Self {
                frame_delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self { frame_delay: delay })
        }
    }

    #[async_trait]
    impl Renderer for StubRenderer {
        async fn render_frame(
            &self,
            composition: &Composition,
            _time: TimeSec,
        ) -> ExportResult<RenderedFrame> {
            if !self.frame_delay.is_zero() {
                tokio::time::sleep(self.frame_delay).await;
            }
            let len = PixelFormat::Rgba8.buffer_len(composition.width, composition.height);
            Ok(RenderedFrame::new(
                composition.width,
                composition.height,
                PixelFormat::Rgba8,
                vec![0x55; len],
            ))
        }

        async fn audio_samples(
            &self,
            _composition: &Composition,
            _time: TimeSec,
            window: TimeSec,
        ) -> ExportResult<AudioBuffer> {
            Ok(AudioBuffer::silence(48_000, 2, window))
        }
    }

    fn orchestrator_with(
        renderer: Arc<StubRenderer>,
        max_workers: usize,
    ) -> ExportOrchestrator {
        let config = PipelineConfig {
            max_workers,
            ..Default::default()
        };
        ExportOrchestrator::with_config(config, renderer, Arc::new(SoftwareBackend::new()))
    }

    fn one_second_composition() -> Composition {
        Composition::new("comp_001", 1.0, 30.0, 64, 36)
    }

    async fn wait_for_terminal(orchestrator: &ExportOrchestrator, job_id: JobId) -> JobStatus {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(status) = orchestrator.export_status(job_id) {
                    if status.is_terminal() {
                        return status;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not reach a terminal status in time")
    }

    #[tokio::test]
    async fn test_end_to_end_video_only_export() {
        let orchestrator = orchestrator_with(StubRenderer::fast(), 2);
        let options = ExportOptions {
            quality: Quality::preset(QualityPreset::Medium),
            ..Default::default()
        };

        let job = orchestrator
            .create_export_job(one_second_composition(), options)
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.total_frames(), 30);

        orchestrator.start_export(job.id).unwrap();
        assert_eq!(wait_for_terminal(&orchestrator, job.id).await, JobStatus::Completed);

        let artifact = orchestrator.export_result(job.id).unwrap();
        let video = artifact.video.expect("video stream expected");
        assert_eq!(video.media_type, "video/mp4");
        assert_eq!(video.chunk_count(), 30);
        assert!(video.chunks[0].is_key);
        assert!(artifact.audio.is_none());

        // Retrieval is one-shot and destructive
        let err = orchestrator.export_result(job.id).unwrap_err();
        assert_eq!(err.code(), "JOB_NOT_FOUND");
        assert!(orchestrator.export_status(job.id).is_none());
    }

    #[tokio::test]
    async fn test_export_with_audio_track() {
        let orchestrator = orchestrator_with(StubRenderer::fast(), 2);
        let composition = one_second_composition().with_audio();

        let job = orchestrator
            .create_export_job(composition, ExportOptions::default())
            .unwrap();
        orchestrator.start_export(job.id).unwrap();
        assert_eq!(wait_for_terminal(&orchestrator, job.id).await, JobStatus::Completed);

        let artifact = orchestrator.export_result(job.id).unwrap();
        assert!(artifact.video.is_some());
        let audio = artifact.audio.expect("audio stream expected");
        assert_eq!(audio.media_type, "video/mp4");
        assert_eq!(audio.chunk_count(), 30);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_bounded() {
        let orchestrator = orchestrator_with(StubRenderer::fast(), 1);
        let job = orchestrator
            .create_export_job(one_second_composition(), ExportOptions::default())
            .unwrap();

        let frames = Arc::new(Mutex::new(Vec::<u64>::new()));
        let frames_clone = Arc::clone(&frames);
        orchestrator.on_progress(
            job.id,
            Box::new(move |progress| {
                frames_clone.lock().unwrap().push(progress.current_frame);
            }),
        );

        orchestrator.start_export(job.id).unwrap();
        wait_for_terminal(&orchestrator, job.id).await;
        orchestrator.remove_progress_callback(job.id);

        let frames = frames.lock().unwrap();
        assert!(!frames.is_empty());
        assert!(frames.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(frames.iter().all(|&frame| frame <= 30));
        assert_eq!(*frames.last().unwrap(), 30);
    }

    #[tokio::test]
    async fn test_cancellation_within_one_frame() {
        let orchestrator = orchestrator_with(StubRenderer::slow(Duration::from_millis(20)), 1);
        let composition = Composition::new("comp_001", 10.0, 30.0, 64, 36);

        let job = orchestrator
            .create_export_job(composition, ExportOptions::default())
            .unwrap();
        orchestrator.start_export(job.id).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        orchestrator.cancel_export(job.id).unwrap();

        assert_eq!(wait_for_terminal(&orchestrator, job.id).await, JobStatus::Cancelled);

        let err = orchestrator.export_result(job.id).unwrap_err();
        assert_eq!(err.code(), "JOB_NOT_COMPLETED");

        // The worker slot frees once the cancellation is observed
        tokio::time::timeout(Duration::from_secs(5), async {
            while orchestrator.busy_workers() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("worker did not go idle after cancellation");

        // Cancel on a terminal job is a no-op
        orchestrator.cancel_export(job.id).unwrap();
    }

    #[tokio::test]
    async fn test_no_workers_leaves_job_queued() {
        let orchestrator = orchestrator_with(StubRenderer::slow(Duration::from_millis(20)), 1);
        let long_composition = Composition::new("comp_001", 10.0, 30.0, 64, 36);

        let first = orchestrator
            .create_export_job(long_composition.clone(), ExportOptions::default())
            .unwrap();
        orchestrator.start_export(first.id).unwrap();

        let second = orchestrator
            .create_export_job(one_second_composition(), ExportOptions::default())
            .unwrap();
        let err = orchestrator.start_export(second.id).unwrap_err();
        assert_eq!(err.code(), "NO_WORKERS_AVAILABLE");
        assert!(err.is_transient());

        // The job is still queued, not running-but-unassigned
        assert_eq!(orchestrator.export_status(second.id), Some(JobStatus::Queued));
        assert!(orchestrator.queued_jobs().contains(&second.id));

        // Once the pool frees up, the same job starts normally
        orchestrator.cancel_export(first.id).unwrap();
        wait_for_terminal(&orchestrator, first.id).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while orchestrator.busy_workers() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        orchestrator.start_export(second.id).unwrap();
        assert_eq!(wait_for_terminal(&orchestrator, second.id).await, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_start_next_follows_priority_order() {
        let orchestrator = orchestrator_with(StubRenderer::fast(), 1);
        let short = Composition::new("comp_001", 0.1, 30.0, 32, 18);

        let make = |priority: Priority| {
            orchestrator
                .create_export_job(
                    short.clone(),
                    ExportOptions {
                        priority,
                        ..Default::default()
                    },
                )
                .unwrap()
                .id
        };
        let a = make(Priority::Low);
        let b = make(Priority::High);
        let c = make(Priority::High);

        let mut started = Vec::new();
        for _ in 0..3 {
            let job_id = orchestrator.start_next_export().unwrap().unwrap();
            started.push(job_id);
            wait_for_terminal(&orchestrator, job_id).await;
            orchestrator.pool.wait_all_idle().await;
        }

        assert_eq!(started, vec![b, c, a]);
        assert_eq!(orchestrator.start_next_export().unwrap(), None);
    }

    #[tokio::test]
    async fn test_pool_never_exceeds_worker_cap() {
        let orchestrator = orchestrator_with(StubRenderer::slow(Duration::from_millis(20)), 2);
        let composition = Composition::new("comp_001", 5.0, 30.0, 64, 36);

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(
                orchestrator
                    .create_export_job(composition.clone(), ExportOptions::default())
                    .unwrap()
                    .id,
            );
        }

        let mut started = 0;
        for &id in &ids {
            match orchestrator.start_export(id) {
                Ok(()) => started += 1,
                Err(error) => assert_eq!(error.code(), "NO_WORKERS_AVAILABLE"),
            }
        }

        assert_eq!(started, 2);
        assert_eq!(orchestrator.busy_workers(), 2);
        assert_eq!(orchestrator.active_jobs().len(), 2);

        orchestrator.shutdown().await;
        assert_eq!(orchestrator.busy_workers(), 0);
    }

    #[tokio::test]
    async fn test_unknown_job_ids_degrade_gracefully() {
        let orchestrator = orchestrator_with(StubRenderer::fast(), 1);

        assert!(orchestrator.export_status(999).is_none());
        assert!(orchestrator.export_progress(999).is_none());
        assert_eq!(
            orchestrator.cancel_export(999).unwrap_err().code(),
            "JOB_NOT_FOUND"
        );
        assert_eq!(
            orchestrator.export_result(999).unwrap_err().code(),
            "JOB_NOT_FOUND"
        );
        assert_eq!(
            orchestrator.start_export(999).unwrap_err().code(),
            "JOB_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_frame_deadline_fails_job() {
        let config = PipelineConfig {
            max_workers: 1,
            frame_deadline: Duration::from_millis(20),
            ..Default::default()
        };
        let orchestrator = ExportOrchestrator::with_config(
            config,
            StubRenderer::slow(Duration::from_millis(200)),
            Arc::new(SoftwareBackend::new()),
        );

        let job = orchestrator
            .create_export_job(one_second_composition(), ExportOptions::default())
            .unwrap();
        orchestrator.start_export(job.id).unwrap();

        assert_eq!(wait_for_terminal(&orchestrator, job.id).await, JobStatus::Failed);

        let failed = orchestrator.job(job.id).unwrap();
        let error = failed.error.expect("error recorded on the job");
        assert_eq!(error.code, "FRAME_DEADLINE_EXCEEDED");
    }

    #[tokio::test]
    async fn test_file_destination_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.mp4");

        let orchestrator = orchestrator_with(StubRenderer::fast(), 1);
        let options = ExportOptions {
            destination: Destination::File {
                path: path.clone(),
                overwrite: false,
            },
            ..Default::default()
        };

        let job = orchestrator
            .create_export_job(one_second_composition(), options)
            .unwrap();
        orchestrator.start_export(job.id).unwrap();
        assert_eq!(wait_for_terminal(&orchestrator, job.id).await, JobStatus::Completed);

        let written = std::fs::read(&path).unwrap();
        assert!(!written.is_empty());
    }

    #[tokio::test]
    async fn test_file_destination_respects_overwrite_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.mp4");
        std::fs::write(&path, b"existing").unwrap();

        let orchestrator = orchestrator_with(StubRenderer::fast(), 1);
        let options = ExportOptions {
            destination: Destination::File {
                path: path.clone(),
                overwrite: false,
            },
            ..Default::default()
        };

        let job = orchestrator
            .create_export_job(one_second_composition(), options)
            .unwrap();
        orchestrator.start_export(job.id).unwrap();
        assert_eq!(wait_for_terminal(&orchestrator, job.id).await, JobStatus::Failed);

        let failed = orchestrator.job(job.id).unwrap();
        assert_eq!(failed.error.unwrap().code, "DESTINATION_EXISTS");
        // The existing file is untouched
        assert_eq!(std::fs::read(&path).unwrap(), b"existing");
    }

    /// Backend without video support: the pipeline degrades to omitting the
    /// stream instead of failing jobs that still have audio to produce
    struct AudioOnlyBackend {
        inner: SoftwareBackend,
    }

    impl EncoderBackend for AudioOnlyBackend {
        fn name(&self) -> &'static str {
            "audio-only"
        }

        fn supports_video_config(&self, _config: &VideoEncoderConfig) -> bool {
            false
        }

        fn supports_audio_config(&self, config: &AudioEncoderConfig) -> bool {
            self.inner.supports_audio_config(config)
        }

        fn hardware_capabilities(&self) -> Option<HardwareAcceleration> {
            Some(HardwareAcceleration::unavailable())
        }

        fn open_video(
            &self,
            _config: &VideoEncoderConfig,
        ) -> ExportResult<Box<dyn EncoderSession>> {
            Err(ExportError::EncoderInitFailed("no video support".into()))
        }

        fn open_audio(
            &self,
            config: &AudioEncoderConfig,
        ) -> ExportResult<Box<dyn EncoderSession>> {
            self.inner.open_audio(config)
        }
    }

    #[tokio::test]
    async fn test_missing_video_capability_degrades_to_audio_only() {
        let orchestrator = ExportOrchestrator::with_config(
            PipelineConfig {
                max_workers: 1,
                ..Default::default()
            },
            StubRenderer::fast(),
            Arc::new(AudioOnlyBackend {
                inner: SoftwareBackend::new(),
            }),
        );

        let composition = one_second_composition().with_audio();
        let job = orchestrator
            .create_export_job(composition, ExportOptions::default())
            .unwrap();
        orchestrator.start_export(job.id).unwrap();
        assert_eq!(wait_for_terminal(&orchestrator, job.id).await, JobStatus::Completed);

        let artifact = orchestrator.export_result(job.id).unwrap();
        assert!(artifact.video.is_none());
        assert!(artifact.audio.is_some());
    }

    #[tokio::test]
    async fn test_no_producible_stream_fails_with_codec_unavailable() {
        let orchestrator = ExportOrchestrator::with_config(
            PipelineConfig {
                max_workers: 1,
                ..Default::default()
            },
            StubRenderer::fast(),
            Arc::new(AudioOnlyBackend {
                inner: SoftwareBackend::new(),
            }),
        );

        // No audio track, no video capability: nothing to produce
        let job = orchestrator
            .create_export_job(one_second_composition(), ExportOptions::default())
            .unwrap();
        orchestrator.start_export(job.id).unwrap();
        assert_eq!(wait_for_terminal(&orchestrator, job.id).await, JobStatus::Failed);

        let failed = orchestrator.job(job.id).unwrap();
        assert_eq!(failed.error.unwrap().code, "CODEC_UNAVAILABLE");
    }
}
