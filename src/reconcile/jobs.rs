// Job management for background reconciliation
// Analyses run on a worker thread; progress lands in a shared store that
// read paths query by job id without ever blocking on the running job

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;

use crate::catalog::CatalogStore;
use crate::config::ScanConfig;
use crate::error::SyncUtilityError;
use crate::reconcile::engine::ReconcileEngine;
use crate::reconcile::progress::{CancelFlag, ProgressSnapshot};
use crate::reconcile::report::ReconciliationResult;

/// Latest progress snapshot per job id. Lookups are read-only and never wait
/// for the job itself; an unknown id yields the idle snapshot, not an error.
#[derive(Clone, Default)]
pub struct JobProgressStore {
    inner: Arc<RwLock<HashMap<String, ProgressSnapshot>>>,
}

impl JobProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &str) -> ProgressSnapshot {
        self.inner
            .read()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_else(ProgressSnapshot::idle)
    }

    pub fn update(&self, job_id: &str, snapshot: ProgressSnapshot) {
        self.inner.write().unwrap().insert(job_id.to_string(), snapshot);
    }

    pub fn remove(&self, job_id: &str) {
        self.inner.write().unwrap().remove(job_id);
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Handle to a reconciliation running on a worker thread
pub struct JobHandle {
    job_id: String,
    cancel: CancelFlag,
    handle: thread::JoinHandle<Result<ReconciliationResult, SyncUtilityError>>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Request cooperative cancellation; takes effect at the job's next
    /// progress checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job and return its result
    pub fn join(self) -> Result<ReconciliationResult, SyncUtilityError> {
        self.handle.join().unwrap_or_else(|_| {
            Err(SyncUtilityError::IoError {
                path: None,
                operation: "joining analysis worker thread".to_string(),
                source: std::io::Error::other("worker thread panicked"),
            })
        })
    }
}

/// Spawn a folder analysis on a worker thread. Progress flows into `jobs`
/// under `job_id`; the returned handle carries the cancel flag and the
/// eventual result.
pub fn spawn_analysis(
    store: CatalogStore,
    jobs: JobProgressStore,
    job_id: impl Into<String>,
    folder_a: PathBuf,
    folder_b: PathBuf,
    config: ScanConfig,
) -> JobHandle {
    let job_id = job_id.into();
    let cancel = CancelFlag::new();

    let callback_jobs = jobs.clone();
    let callback_id = job_id.clone();
    let engine = ReconcileEngine::new()
        .with_scan_config(config)
        .with_cancel_flag(cancel.clone())
        .with_progress_callback(move |snapshot| {
            callback_jobs.update(&callback_id, snapshot);
        });

    let handle = thread::spawn(move || engine.analyze(&store, &folder_a, &folder_b));

    JobHandle { job_id, cancel, handle }
}
