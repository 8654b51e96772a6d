// Reconciliation module
// Folder-tree diffing, progress reporting and background job plumbing

pub mod engine;
pub mod jobs;
pub mod progress;
pub mod report;

pub use engine::ReconcileEngine;
pub use jobs::{spawn_analysis, JobHandle, JobProgressStore};
pub use progress::{
    CancelFlag, ProgressCallback, ProgressPhase, ProgressSnapshot, ProgressThrottle,
    EMIT_EVERY_ITEMS, EMIT_MIN_INTERVAL,
};
pub use report::{ConflictGroup, ReconciliationResult, SuspectedRename};
