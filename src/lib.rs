//! Animator Export Pipeline
//!
//! Turns an in-memory animated composition into encoded video/audio streams
//! using a prioritized job queue, a bounded pool of encode workers, and
//! pluggable codec backends. Frame rendering and container muxing are
//! external collaborators: the pipeline pulls frames and audio from a
//! [`Renderer`] and hands back encoded streams for muxing elsewhere.

pub mod backend;
pub mod capability;
pub mod encoder;
pub mod formats;
pub mod jobs;
pub mod orchestrator;
pub mod progress;
pub mod renderer;
pub mod validate;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

pub use backend::{EncodedChunk, EncoderBackend, EncoderSession, SoftwareBackend};
pub use capability::{CapabilityProbe, CapabilitySet, CodecCapability, HardwareAcceleration};
pub use encoder::{AudioEncoder, EncodedBlob, VideoEncoder};
pub use formats::{
    AudioCodec, Container, Destination, ExportFormat, ExportOptions, Quality, QualityPreset,
    VideoCodec,
};
pub use jobs::{
    ExportArtifact, ExportJob, ExportProgress, JobPhase, JobStatus, Priority, WorkerPool,
    MAX_WORKERS,
};
pub use orchestrator::{ExportOrchestrator, PipelineConfig};
pub use progress::ProgressTracker;
pub use renderer::{AudioBuffer, MediaSample, PixelFormat, RenderedFrame, Renderer};
pub use validate::{CheckOutcome, QualityValidator, ValidationCheck, ValidationReport};
