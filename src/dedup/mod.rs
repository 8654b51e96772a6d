// Duplicate elimination module
// Keeps exactly one file per duplicate group and deletes the rest, with
// locked-file detection and per-file error isolation

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::audit::{AuditKind, AuditRecord, AuditSink};
use crate::catalog::{CatalogStore, FileRecord};
use crate::error::SyncUtilityError;
use crate::lock::{ExclusiveOpenProbe, LockOwnerProbe};
use crate::reconcile::report::ReconciliationResult;

/// Files sharing one content hash within a catalog slice
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub records: Vec<FileRecord>,
    pub count: usize,
}

/// Counters for a dedup batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupStats {
    pub groups_processed: usize,
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
    pub bytes_freed: u64,
}

/// Outcome of a dedup batch. Partial success is expected: counters and the
/// itemized error list are reported together.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    pub kept: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub stats: DedupStats,
}

/// Which side(s) of a reconciliation to clean up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupScope {
    SideA,
    SideB,
    Both,
}

/// Engine for removing redundant copies
pub struct DedupEngine {
    probe: Box<dyn LockOwnerProbe>,
}

impl DedupEngine {
    pub fn new() -> Self {
        Self { probe: Box::new(ExclusiveOpenProbe) }
    }

    pub fn with_probe(probe: Box<dyn LockOwnerProbe>) -> Self {
        Self { probe }
    }

    /// Group every record under `root` by content hash and return the groups
    /// with more than one member, sorted by hash for stable output
    pub fn find_duplicates(&self, catalog: &CatalogStore, root: &Path) -> Vec<DuplicateGroup> {
        let mut by_hash: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
        for record in catalog.records_under(root) {
            by_hash.entry(record.content_hash.clone()).or_default().push(record);
        }

        by_hash
            .into_iter()
            .filter(|(_, records)| records.len() > 1)
            .map(|(hash, records)| {
                let count = records.len();
                DuplicateGroup { hash, records, count }
            })
            .collect()
    }

    /// Space that deleting all but one file per group would free, preferring
    /// to keep files under `keep_location`
    pub fn space_savings(groups: &[DuplicateGroup], keep_location: &Path) -> u64 {
        let mut total = 0u64;
        for group in groups {
            let keeper = group
                .records
                .iter()
                .position(|r| r.path.starts_with(keep_location))
                .unwrap_or(0);
            for (idx, record) in group.records.iter().enumerate() {
                if idx != keeper {
                    total += record.size;
                }
            }
        }
        total
    }

    /// Clean up the conflict groups of a reconciliation: per group (scoped to
    /// one or both sides), keep the most-recently-modified record and delete
    /// the others. After the batch, stale catalog entries for the scoped
    /// trees are swept regardless of which deletions succeeded.
    pub fn eliminate_conflicts(
        &self,
        analysis: &ReconciliationResult,
        scope: DedupScope,
        catalog: &CatalogStore,
        audit: &dyn AuditSink,
    ) -> DedupReport {
        let mut report = DedupReport::default();

        for group in &analysis.conflicts {
            let mut candidates: Vec<FileRecord> = Vec::new();
            if matches!(scope, DedupScope::SideA | DedupScope::Both) {
                candidates.extend(group.a_side.iter().cloned());
            }
            if matches!(scope, DedupScope::SideB | DedupScope::Both) {
                candidates.extend(group.b_side.iter().cloned());
            }
            if candidates.len() < 2 {
                continue;
            }

            report.stats.groups_processed += 1;
            self.retain_newest(&group.name, &candidates, catalog, audit, &mut report);
        }

        // Defensive consistency pass, independent of deletion outcomes
        if matches!(scope, DedupScope::SideA | DedupScope::Both) {
            catalog.reconcile_stale(&analysis.folder_a);
        }
        if matches!(scope, DedupScope::SideB | DedupScope::Both) {
            catalog.reconcile_stale(&analysis.folder_b);
        }

        report
    }

    /// Clean up same-hash duplicate groups, keeping one file per group —
    /// preferring `keep_location` when given, the first record otherwise
    pub fn eliminate_duplicates(
        &self,
        groups: &[DuplicateGroup],
        keep_location: Option<&Path>,
        catalog: &CatalogStore,
        audit: &dyn AuditSink,
    ) -> DedupReport {
        let mut report = DedupReport::default();
        let mut touched_dirs: BTreeSet<PathBuf> = BTreeSet::new();

        for group in groups {
            if group.records.len() < 2 {
                continue;
            }
            report.stats.groups_processed += 1;

            let keeper = keep_location
                .and_then(|loc| group.records.iter().position(|r| r.path.starts_with(loc)))
                .unwrap_or(0);

            for record in &group.records {
                if let Some(parent) = record.path.parent() {
                    touched_dirs.insert(parent.to_path_buf());
                }
            }

            self.delete_all_but(&group.records, keeper, catalog, audit, &mut report);
        }

        for dir in touched_dirs {
            catalog.reconcile_stale(&dir);
        }

        report
    }

    /// Pick the most-recently-modified candidate and delete the rest.
    /// With no usable timestamp on any candidate, the first record in input
    /// order is kept (deterministic) and a warning is surfaced.
    fn retain_newest(
        &self,
        group_name: &str,
        candidates: &[FileRecord],
        catalog: &CatalogStore,
        audit: &dyn AuditSink,
        report: &mut DedupReport,
    ) {
        let mut keeper = 0usize;
        let mut keeper_time = candidates[0].best_timestamp();
        for (idx, record) in candidates.iter().enumerate().skip(1) {
            match (record.best_timestamp(), keeper_time) {
                (Some(ts), Some(best)) if ts > best => {
                    keeper = idx;
                    keeper_time = Some(ts);
                }
                (Some(ts), None) => {
                    keeper = idx;
                    keeper_time = Some(ts);
                }
                _ => {}
            }
        }

        if keeper_time.is_none() {
            report.warnings.push(format!(
                "No usable timestamp for '{}'; keeping the first record in input order",
                group_name
            ));
        }

        self.delete_all_but(candidates, keeper, catalog, audit, report);
    }

    fn delete_all_but(
        &self,
        candidates: &[FileRecord],
        keeper: usize,
        catalog: &CatalogStore,
        audit: &dyn AuditSink,
        report: &mut DedupReport,
    ) {
        report.kept.push(candidates[keeper].path.clone());
        report.stats.kept += 1;

        for (idx, record) in candidates.iter().enumerate() {
            if idx == keeper {
                continue;
            }
            match self.delete_file(record, catalog, audit) {
                Ok(freed) => {
                    report.deleted.push(record.path.clone());
                    report.stats.deleted += 1;
                    report.stats.bytes_freed += freed;
                }
                Err(e) => {
                    report.errors.push(format!("{}: {}", record.path.display(), e.brief()));
                    report.stats.failed += 1;
                }
            }
        }
    }

    /// Deletion protocol: existence check, lock probe, delete, catalog
    /// removal, audit entry with bytes freed. A locked file is a per-file
    /// error, never fatal to the batch.
    fn delete_file(
        &self,
        record: &FileRecord,
        catalog: &CatalogStore,
        audit: &dyn AuditSink,
    ) -> Result<u64, SyncUtilityError> {
        if !record.path.exists() {
            // Already gone; dropping the stale record is all that's left
            catalog.remove(&record.path);
            return Ok(0);
        }

        let status = self.probe.probe(&record.path);
        if status.locked {
            return Err(SyncUtilityError::TargetLocked {
                path: record.path.clone(),
                owner: status.owner,
            });
        }

        match fs::remove_file(&record.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                let status = self.probe.probe(&record.path);
                return Err(SyncUtilityError::TargetLocked {
                    path: record.path.clone(),
                    owner: status.owner,
                });
            }
            Err(e) => {
                return Err(SyncUtilityError::from_io_error(
                    e,
                    "deleting",
                    Some(record.path.clone()),
                ))
            }
        }

        catalog.remove(&record.path);
        audit.record(
            AuditRecord::new(
                AuditKind::Delete,
                format!("Deleted duplicate file: {}", record.path.display()),
                &record.path,
            )
            .with_bytes(record.size),
        );

        Ok(record.size)
    }
}

impl Default for DedupEngine {
    fn default() -> Self {
        Self::new()
    }
}
