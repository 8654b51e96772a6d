// Reconciliation engine
// The core diff: scans two folder trees into the catalog, then classifies
// every record as exact-matched, unique to one side, or conflicting

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::catalog::{basename, CatalogStore, FileRecord, HashComputer, ScanEngine};
use crate::config::ScanConfig;
use crate::error::SyncUtilityError;
use crate::reconcile::progress::{
    CancelFlag, ProgressCallback, ProgressPhase, ProgressSnapshot, ProgressThrottle,
};
use crate::reconcile::report::{ConflictGroup, ReconciliationResult, SuspectedRename};

/// Engine for comparing two folder trees through the catalog.
///
/// Matching is by filename (basename), not relative path: a file moved
/// between subdirectories of the same tree is still compared against the
/// other tree's same-named file.
pub struct ReconcileEngine {
    computer: HashComputer,
    scan_config: ScanConfig,
    progress_callback: Option<Arc<ProgressCallback>>,
    cancel: CancelFlag,
}

/// Per-run progress state. Counters only ever grow, and `scanned` is derived
/// as `equals + needs_sync`, so every emitted snapshot satisfies the
/// reporting invariant and the value is monotone.
struct ProgressTracker {
    callback: Option<Arc<ProgressCallback>>,
    throttle: ProgressThrottle,
    phase: ProgressPhase,
    equals: usize,
    needs_sync: usize,
    indexed: usize,
}

impl ProgressTracker {
    fn new(callback: Option<Arc<ProgressCallback>>) -> Self {
        Self {
            callback,
            throttle: ProgressThrottle::new(),
            phase: ProgressPhase::Starting,
            equals: 0,
            needs_sync: 0,
            indexed: 0,
        }
    }

    fn snapshot(&self, current_file: &str) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase,
            current_file: current_file.to_string(),
            scanned: self.equals + self.needs_sync,
            equals: self.equals,
            needs_sync: self.needs_sync,
            indexed: self.indexed,
        }
    }

    /// Unconditional emission, used on phase transitions
    fn emit(&mut self, current_file: &str) {
        if let Some(ref callback) = self.callback {
            callback(self.snapshot(current_file));
        }
        self.throttle.reset();
    }

    /// Throttled emission, used per processed item
    fn tick(&mut self, current_file: &str) {
        if self.throttle.tick() {
            if let Some(ref callback) = self.callback {
                callback(self.snapshot(current_file));
            }
        }
    }
}

impl ReconcileEngine {
    pub fn new() -> Self {
        Self {
            computer: HashComputer::new(),
            scan_config: ScanConfig::default(),
            progress_callback: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_scan_config(mut self, config: ScanConfig) -> Self {
        self.scan_config = config;
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressSnapshot) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle for requesting cooperative cancellation of a running analysis
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Scan and index both folders, then classify their records.
    ///
    /// A cancellation request takes effect at the next progress checkpoint
    /// and yields a partial result with `incomplete = true`; catalog updates
    /// made up to that point stay committed. Structural problems (missing
    /// folders) abort before any work starts.
    pub fn analyze(
        &self,
        store: &CatalogStore,
        folder_a: &Path,
        folder_b: &Path,
    ) -> Result<ReconciliationResult, SyncUtilityError> {
        if !folder_a.exists() {
            return Err(SyncUtilityError::PathNotFound { path: folder_a.to_path_buf() });
        }
        if !folder_b.exists() {
            return Err(SyncUtilityError::PathNotFound { path: folder_b.to_path_buf() });
        }

        let mut tracker = ProgressTracker::new(self.progress_callback.clone());
        tracker.emit("Starting analysis...");

        for (phase, folder) in [(ProgressPhase::ScanA, folder_a), (ProgressPhase::ScanB, folder_b)] {
            match self.scan_side(store, folder, phase, &mut tracker) {
                Ok(()) => {}
                Err(SyncUtilityError::Cancelled) => {
                    let mut result =
                        ReconciliationResult::empty(folder_a.to_path_buf(), folder_b.to_path_buf());
                    result.incomplete = true;
                    tracker.phase = ProgressPhase::Cancelled;
                    tracker.emit("Analysis cancelled");
                    return Ok(result);
                }
                Err(e) => return Err(e),
            }
        }

        tracker.phase = ProgressPhase::Compare;
        tracker.emit("Comparing folders...");

        let records_a = store.records_under(folder_a);
        let records_b = store.records_under(folder_b);
        let result = self.compare_with_tracker(folder_a, folder_b, &records_a, &records_b, &mut tracker);

        tracker.phase = if result.incomplete {
            ProgressPhase::Cancelled
        } else {
            ProgressPhase::Complete
        };
        tracker.emit("Comparison completed");

        Ok(result)
    }

    /// Classify two sides' records without touching the filesystem. Exposed
    /// for callers that already hold catalog slices.
    pub fn compare_records(
        &self,
        folder_a: &Path,
        folder_b: &Path,
        records_a: &[FileRecord],
        records_b: &[FileRecord],
    ) -> ReconciliationResult {
        let mut tracker = ProgressTracker::new(self.progress_callback.clone());
        tracker.phase = ProgressPhase::Compare;
        self.compare_with_tracker(folder_a, folder_b, records_a, records_b, &mut tracker)
    }

    fn scan_side(
        &self,
        store: &CatalogStore,
        folder: &Path,
        phase: ProgressPhase,
        tracker: &mut ProgressTracker,
    ) -> Result<(), SyncUtilityError> {
        tracker.phase = phase;
        tracker.emit(&format!("Scanning {}...", folder.display()));

        let scan = ScanEngine::with_config(self.scan_config.clone());
        let files = scan.collect_files(folder)?;

        // Drop ghost records for this folder before refreshing it
        store.reconcile_stale(folder);

        for path in &files {
            if self.cancel.is_cancelled() {
                return Err(SyncUtilityError::Cancelled);
            }
            store.index_path(path, &self.computer);
            tracker.indexed += 1;
            tracker.tick(&basename(path));
        }

        tracker.emit(&format!("Completed scanning {}", folder.display()));
        Ok(())
    }

    fn compare_with_tracker(
        &self,
        folder_a: &Path,
        folder_b: &Path,
        records_a: &[FileRecord],
        records_b: &[FileRecord],
        tracker: &mut ProgressTracker,
    ) -> ReconciliationResult {
        let mut result =
            ReconciliationResult::empty(folder_a.to_path_buf(), folder_b.to_path_buf());

        // Group each side by basename; BTreeMap gives the stable sorted
        // iteration the ordering guarantees depend on. Records arrive sorted
        // by path, so group members are ordered too.
        let mut by_name_a: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
        for record in records_a {
            by_name_a.entry(record.name.clone()).or_default().push(record.clone());
        }
        let mut by_name_b: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
        for record in records_b {
            by_name_b.entry(record.name.clone()).or_default().push(record.clone());
        }

        let names: BTreeSet<String> =
            by_name_a.keys().chain(by_name_b.keys()).cloned().collect();

        // Pairs already explained by same-name matching, per content hash;
        // consulted later so rename detection does not double-count
        let mut matched_by_name: BTreeMap<String, usize> = BTreeMap::new();

        for name in &names {
            if self.cancel.is_cancelled() {
                result.incomplete = true;
                break;
            }

            match (by_name_a.get(name), by_name_b.get(name)) {
                (Some(a_records), None) => {
                    tracker.needs_sync += a_records.len();
                    result.only_in_a.extend(a_records.iter().cloned());
                }
                (None, Some(b_records)) => {
                    tracker.needs_sync += b_records.len();
                    result.only_in_b.extend(b_records.iter().cloned());
                }
                (Some(a_records), Some(b_records)) => {
                    // Sub-group this name's records by hash and pair off
                    // min(count_a, count_b) per hash as exact matches
                    let mut a_by_hash: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
                    for record in a_records {
                        a_by_hash.entry(record.content_hash.as_str()).or_default().push(record);
                    }
                    let mut b_by_hash: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
                    for record in b_records {
                        b_by_hash.entry(record.content_hash.as_str()).or_default().push(record);
                    }

                    let mut leftover_a: Vec<FileRecord> = Vec::new();
                    let mut leftover_b: Vec<FileRecord> = Vec::new();
                    let mut pairs_here = 0usize;

                    for (hash, a_list) in &a_by_hash {
                        match b_by_hash.get(hash) {
                            Some(b_list) => {
                                let pairs = a_list.len().min(b_list.len());
                                pairs_here += pairs;
                                *matched_by_name.entry((*hash).to_string()).or_insert(0) += pairs;
                                // Count excess beyond the paired minimum
                                leftover_a.extend(a_list[pairs..].iter().map(|r| (*r).clone()));
                                leftover_b.extend(b_list[pairs..].iter().map(|r| (*r).clone()));
                            }
                            None => {
                                leftover_a.extend(a_list.iter().map(|r| (*r).clone()));
                            }
                        }
                    }
                    for (hash, b_list) in &b_by_hash {
                        if !a_by_hash.contains_key(hash) {
                            leftover_b.extend(b_list.iter().map(|r| (*r).clone()));
                        }
                    }

                    result.exact_matches += pairs_here;
                    tracker.equals += pairs_here;

                    if !leftover_a.is_empty() || !leftover_b.is_empty() {
                        tracker.needs_sync += leftover_a.len() + leftover_b.len();
                        result.conflicts.push(ConflictGroup {
                            name: name.clone(),
                            a_side: leftover_a,
                            b_side: leftover_b,
                            matched_pairs: pairs_here,
                        });
                    }
                }
                (None, None) => unreachable!("name taken from one of the two sides"),
            }

            tracker.tick(name);
        }

        if !result.incomplete {
            self.detect_renames(&by_name_a, &by_name_b, &matched_by_name, &mut result, tracker);
        }

        result.space_needed_a = result.only_in_b.iter().map(|r| r.size).sum();
        result.space_needed_b = result.only_in_a.iter().map(|r| r.size).sum();

        result
    }

    /// Hash-only matching across different filenames. A hash present on both
    /// sides, with pairs left over after same-name matching and no shared
    /// filename, is surfaced as a suspected rename.
    fn detect_renames(
        &self,
        by_name_a: &BTreeMap<String, Vec<FileRecord>>,
        by_name_b: &BTreeMap<String, Vec<FileRecord>>,
        matched_by_name: &BTreeMap<String, usize>,
        result: &mut ReconciliationResult,
        tracker: &mut ProgressTracker,
    ) {
        let collect = |by_name: &BTreeMap<String, Vec<FileRecord>>| {
            let mut info: BTreeMap<String, (usize, BTreeSet<String>)> = BTreeMap::new();
            for (name, records) in by_name {
                for record in records {
                    let entry = info.entry(record.content_hash.clone()).or_default();
                    entry.0 += 1;
                    entry.1.insert(name.clone());
                }
            }
            info
        };

        let hash_info_a = collect(by_name_a);
        let hash_info_b = collect(by_name_b);

        for (hash, (count_a, names_a)) in &hash_info_a {
            if let Some((count_b, names_b)) = hash_info_b.get(hash) {
                let possible = (*count_a).min(*count_b);
                let matched = matched_by_name.get(hash).copied().unwrap_or(0);
                let remaining = possible.saturating_sub(matched);

                if remaining > 0 && names_a.is_disjoint(names_b) {
                    tracker.needs_sync += remaining;
                    result.suspected_renames.push(SuspectedRename {
                        content_hash: hash.clone(),
                        a_names: names_a.iter().cloned().collect(),
                        b_names: names_b.iter().cloned().collect(),
                        pair_count: remaining,
                    });
                }
            }
        }
    }
}

impl Default for ReconcileEngine {
    fn default() -> Self {
        Self::new()
    }
}
