//! Progress Tracking
//!
//! Observer plumbing between workers and callers. One active callback per
//! job id; re-registration replaces the previous callback, removal is
//! explicit. Workers notify whenever a job's progress mutates.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::jobs::ExportProgress;
use crate::types::JobId;

/// Callback invoked with each progress mutation of the registered job
pub type ProgressCallback = Box<dyn Fn(&ExportProgress) + Send + Sync>;

/// Per-job progress callback registry
#[derive(Default)]
pub struct ProgressTracker {
    callbacks: Mutex<HashMap<JobId, ProgressCallback>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for a job, replacing any previous one
    pub fn register(&self, job_id: JobId, callback: ProgressCallback) {
        let replaced = self
            .callbacks
            .lock()
            .unwrap()
            .insert(job_id, callback)
            .is_some();
        if replaced {
            debug!(job_id, "progress callback replaced");
        }
    }

    /// Removes the callback for a job; returns whether one was registered
    pub fn remove(&self, job_id: JobId) -> bool {
        self.callbacks.lock().unwrap().remove(&job_id).is_some()
    }

    /// Invokes the job's callback, if one is registered.
    ///
    /// The callback runs while the registry lock is held, so callbacks must
    /// not call back into the tracker; they should hand the snapshot off and
    /// return.
    pub fn notify(&self, job_id: JobId, progress: &ExportProgress) {
        let callbacks = self.callbacks.lock().unwrap();
        if let Some(callback) = callbacks.get(&job_id) {
            callback(progress);
        }
    }

    pub fn has_callback(&self, job_id: JobId) -> bool {
        self.callbacks.lock().unwrap().contains_key(&job_id)
    }
}
