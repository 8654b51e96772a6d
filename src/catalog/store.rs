// Catalog store
// Thread-safe, path-keyed record store shared by scans and executors.
// The backing representation is opaque to callers; this implementation keeps
// records in memory. Writes serialize per record: last write wins on a path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::hash::HashComputer;
use super::record::FileRecord;

/// Content-addressed index of files under one or more scanned roots
#[derive(Clone, Default)]
pub struct CatalogStore {
    records: Arc<Mutex<HashMap<PathBuf, FileRecord>>>,
    // Per-target-path guards so one executor's copy+verify+upsert sequence
    // cannot interleave with another writer of the same path
    target_guards: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its path
    pub fn upsert(&self, record: FileRecord) {
        self.records.lock().unwrap().insert(record.path.clone(), record);
    }

    pub fn get(&self, path: &Path) -> Option<FileRecord> {
        self.records.lock().unwrap().get(path).cloned()
    }

    pub fn remove(&self, path: &Path) -> Option<FileRecord> {
        self.records.lock().unwrap().remove(path)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records whose path lives under `root`, sorted by path for
    /// deterministic downstream iteration
    pub fn records_under(&self, root: &Path) -> Vec<FileRecord> {
        let records = self.records.lock().unwrap();
        let mut found: Vec<FileRecord> = records
            .values()
            .filter(|r| r.path.starts_with(root))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    /// Index a single path: probe metadata, hash content, upsert the record.
    /// Best-effort — a missing, unreadable or non-regular file yields `None`
    /// and never aborts the surrounding batch scan.
    pub fn index_path(&self, path: &Path, computer: &HashComputer) -> Option<FileRecord> {
        match FileRecord::from_path(path, computer) {
            Ok(record) => {
                self.upsert(record.clone());
                Some(record)
            }
            Err(_) => None,
        }
    }

    /// Drop records under `dir` whose file no longer exists on disk, so the
    /// catalog never keeps ghost entries for a rescanned directory. Scoped to
    /// `dir` only; housekeeping, never fails.
    pub fn reconcile_stale(&self, dir: &Path) -> usize {
        let mut records = self.records.lock().unwrap();
        let stale: Vec<PathBuf> = records
            .keys()
            .filter(|p| p.starts_with(dir) && !p.exists())
            .cloned()
            .collect();
        for path in &stale {
            records.remove(path);
        }
        stale.len()
    }

    /// Guard serializing writers of one target path. Hold the returned lock
    /// across a copy+verify+upsert sequence.
    pub fn path_guard(&self, target: &Path) -> Arc<Mutex<()>> {
        let mut guards = self.target_guards.lock().unwrap();
        guards
            .entry(target.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
