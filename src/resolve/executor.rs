// Resolution executor
// Turns a reconciliation result plus a strategy into verified filesystem
// changes. Plans are built before any mutation; every copy is re-hashed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::audit::{AuditKind, AuditRecord, AuditSink};
use crate::catalog::{basename, CatalogStore, FileRecord, HashComputer};
use crate::error::SyncUtilityError;
use crate::lock::{ExclusiveOpenProbe, LockOwnerProbe};
use crate::reconcile::progress::CancelFlag;
use crate::reconcile::report::ReconciliationResult;
use crate::resolve::strategy::{
    conflict_variant_name, largest_winner, newest_winner, ManualDecision, ResolveStrategy, Side,
};

/// Why a copy was planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyReason {
    /// Unique to B, copied over to A
    MissingOnA,
    /// Unique to A, copied over to B
    MissingOnB,
    /// Conflict resolved in favor of this side's version
    ConflictWinner { winner: Side },
    /// Conflict retained on both sides; this is the renamed variant
    ConflictVariant { origin: Side },
    /// Leftover copy of a name whose other occurrences matched exactly
    ConflictSurplus { origin: Side },
    /// Explicit caller decision
    Manual,
}

/// One planned copy operation
#[derive(Debug, Clone, Serialize)]
pub struct PlannedCopy {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Content hash the target must have after the copy. Filled from the
    /// catalog record; hashed live for manual decisions.
    pub expected_hash: Option<String>,
    pub size: u64,
    pub reason: CopyReason,
}

/// One planned delete operation (manual decisions only)
#[derive(Debug, Clone, Serialize)]
pub struct PlannedDelete {
    pub path: PathBuf,
}

/// Mutation-free execution plan derived from a reconciliation result
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    pub copies: Vec<PlannedCopy>,
    pub deletes: Vec<PlannedDelete>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.copies.len() + self.deletes.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.copies.iter().map(|c| c.size).sum()
    }
}

/// Outcome of one executed plan item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Copied,
    /// Target already held identical content; nothing was written
    Skipped,
    Deleted,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub source: Option<PathBuf>,
    pub target: PathBuf,
    pub status: ItemStatus,
    pub detail: Option<String>,
    pub bytes: u64,
}

/// Aggregate outcome of a plan execution. Partial success is a first-class
/// result: counters and the itemized error list travel together.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub items: Vec<ItemOutcome>,
    pub copied: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
    pub bytes_copied: u64,
    /// True when cancellation stopped the batch before all items ran
    pub incomplete: bool,
}

impl SyncOutcome {
    pub fn errors(&self) -> Vec<&ItemOutcome> {
        self.items.iter().filter(|i| i.status == ItemStatus::Error).collect()
    }

    fn tally(&mut self, outcome: ItemOutcome) {
        match outcome.status {
            ItemStatus::Copied => {
                self.copied += 1;
                self.bytes_copied += outcome.bytes;
            }
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Deleted => self.deleted += 1,
            ItemStatus::Error => self.failed += 1,
        }
        self.items.push(outcome);
    }
}

/// Applies a resolution strategy to a reconciliation result
pub struct ResolutionExecutor {
    computer: HashComputer,
    probe: Box<dyn LockOwnerProbe>,
    cancel: CancelFlag,
    actor: Option<String>,
}

impl ResolutionExecutor {
    pub fn new() -> Self {
        Self {
            computer: HashComputer::new(),
            probe: Box::new(ExclusiveOpenProbe),
            cancel: CancelFlag::new(),
            actor: None,
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn LockOwnerProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Actor recorded on audit entries
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Derive the copy plan for a strategy. Pure planning: nothing on disk
    /// or in the catalog changes here.
    pub fn build_plan(&self, analysis: &ReconciliationResult, strategy: ResolveStrategy) -> SyncPlan {
        let mut plan = SyncPlan::default();

        // Unique files always cross over to the other side
        for record in &analysis.only_in_a {
            plan.copies.push(PlannedCopy {
                source: record.path.clone(),
                target: relative_target(&analysis.folder_a, &analysis.folder_b, record),
                expected_hash: Some(record.content_hash.clone()),
                size: record.size,
                reason: CopyReason::MissingOnB,
            });
        }
        for record in &analysis.only_in_b {
            plan.copies.push(PlannedCopy {
                source: record.path.clone(),
                target: relative_target(&analysis.folder_b, &analysis.folder_a, record),
                expected_hash: Some(record.content_hash.clone()),
                size: record.size,
                reason: CopyReason::MissingOnA,
            });
        }

        for group in &analysis.conflicts {
            // A one-sided group means every pairing for this name matched
            // and one side simply has surplus copies; propagate them like
            // uniques and let skip-if-identical handle the rest
            if group.a_side.is_empty() || group.b_side.is_empty() {
                for record in &group.a_side {
                    plan.copies.push(PlannedCopy {
                        source: record.path.clone(),
                        target: relative_target(&analysis.folder_a, &analysis.folder_b, record),
                        expected_hash: Some(record.content_hash.clone()),
                        size: record.size,
                        reason: CopyReason::ConflictSurplus { origin: Side::A },
                    });
                }
                for record in &group.b_side {
                    plan.copies.push(PlannedCopy {
                        source: record.path.clone(),
                        target: relative_target(&analysis.folder_b, &analysis.folder_a, record),
                        expected_hash: Some(record.content_hash.clone()),
                        size: record.size,
                        reason: CopyReason::ConflictSurplus { origin: Side::B },
                    });
                }
                continue;
            }

            match strategy {
                ResolveStrategy::KeepBoth => {
                    // Each side's version crosses over under a name
                    // disambiguated by origin, so nothing is overwritten
                    for (ordinal, record) in group.b_side.iter().enumerate() {
                        plan.copies.push(PlannedCopy {
                            source: record.path.clone(),
                            target: analysis
                                .folder_a
                                .join(variant_name(&group.name, Side::B, ordinal)),
                            expected_hash: Some(record.content_hash.clone()),
                            size: record.size,
                            reason: CopyReason::ConflictVariant { origin: Side::B },
                        });
                    }
                    for (ordinal, record) in group.a_side.iter().enumerate() {
                        plan.copies.push(PlannedCopy {
                            source: record.path.clone(),
                            target: analysis
                                .folder_b
                                .join(variant_name(&group.name, Side::A, ordinal)),
                            expected_hash: Some(record.content_hash.clone()),
                            size: record.size,
                            reason: CopyReason::ConflictVariant { origin: Side::A },
                        });
                    }
                }
                ResolveStrategy::KeepNewest | ResolveStrategy::KeepLargest => {
                    let record_a = &group.a_side[0];
                    let record_b = &group.b_side[0];
                    let winner_side = match strategy {
                        ResolveStrategy::KeepNewest => newest_winner(record_a, record_b),
                        _ => largest_winner(record_a, record_b),
                    };
                    let (winner, loser) = match winner_side {
                        Side::A => (record_a, record_b),
                        Side::B => (record_b, record_a),
                    };
                    plan.copies.push(PlannedCopy {
                        source: winner.path.clone(),
                        target: loser.path.clone(),
                        expected_hash: Some(winner.content_hash.clone()),
                        size: winner.size,
                        reason: CopyReason::ConflictWinner { winner: winner_side },
                    });
                }
            }
        }

        plan
    }

    /// Build a plan from explicit per-file decisions
    pub fn plan_from_decisions(&self, decisions: &[ManualDecision]) -> SyncPlan {
        let mut plan = SyncPlan::default();
        for decision in decisions {
            match decision {
                ManualDecision::Copy { source, target } => plan.copies.push(PlannedCopy {
                    source: source.clone(),
                    target: target.clone(),
                    expected_hash: None,
                    size: fs::metadata(source).map(|m| m.len()).unwrap_or(0),
                    reason: CopyReason::Manual,
                }),
                ManualDecision::Delete { path } => {
                    plan.deletes.push(PlannedDelete { path: path.clone() })
                }
            }
        }
        plan
    }

    /// Execute a plan. One item's failure never aborts the batch; errors are
    /// collected into the outcome alongside the success counters.
    pub fn execute(
        &self,
        plan: &SyncPlan,
        catalog: &CatalogStore,
        audit: &dyn AuditSink,
    ) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        for item in &plan.copies {
            if self.cancel.is_cancelled() {
                outcome.incomplete = true;
                return outcome;
            }
            let result = match self.try_copy(item, catalog, audit) {
                Ok(item_outcome) => item_outcome,
                Err(e) => ItemOutcome {
                    source: Some(item.source.clone()),
                    target: item.target.clone(),
                    status: ItemStatus::Error,
                    detail: Some(e.brief()),
                    bytes: 0,
                },
            };
            outcome.tally(result);
        }

        for item in &plan.deletes {
            if self.cancel.is_cancelled() {
                outcome.incomplete = true;
                return outcome;
            }
            let result = match self.try_delete(&item.path, catalog, audit) {
                Ok(item_outcome) => item_outcome,
                Err(e) => ItemOutcome {
                    source: None,
                    target: item.path.clone(),
                    status: ItemStatus::Error,
                    detail: Some(e.brief()),
                    bytes: 0,
                },
            };
            outcome.tally(result);
        }

        outcome
    }

    /// The copy protocol: source check, directory creation, skip-if-
    /// identical, byte copy with mtime carry-over, re-hash verification,
    /// catalog refresh, audit entry. The whole sequence holds the target's
    /// path guard so concurrent writers of the same path serialize.
    fn try_copy(
        &self,
        item: &PlannedCopy,
        catalog: &CatalogStore,
        audit: &dyn AuditSink,
    ) -> Result<ItemOutcome, SyncUtilityError> {
        let source_meta = fs::metadata(&item.source).map_err(|e| {
            SyncUtilityError::from_io_error(e, "reading source", Some(item.source.clone()))
        })?;
        if !source_meta.is_file() {
            return Err(SyncUtilityError::UnreadableFile {
                path: item.source.clone(),
                operation: "copying (not a regular file)".to_string(),
            });
        }

        let expected = match &item.expected_hash {
            Some(hash) => hash.clone(),
            None => self.computer.hash_file(&item.source)?,
        };

        let guard = catalog.path_guard(&item.target);
        let _guard = guard.lock().unwrap();

        let target_existed = item.target.exists();
        if target_existed {
            if let Ok(existing) = self.computer.hash_file(&item.target) {
                if existing == expected {
                    return Ok(ItemOutcome {
                        source: Some(item.source.clone()),
                        target: item.target.clone(),
                        status: ItemStatus::Skipped,
                        detail: Some("target already holds identical content".to_string()),
                        bytes: 0,
                    });
                }
            }
        }

        if let Some(parent) = item.target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SyncUtilityError::from_io_error(
                    e,
                    "creating target directory",
                    Some(parent.to_path_buf()),
                )
            })?;
        }

        let bytes = match fs::copy(&item.source, &item.target) {
            Ok(bytes) => bytes,
            Err(e) if target_existed && e.kind() == io::ErrorKind::PermissionDenied => {
                let status = self.probe.probe(&item.target);
                return Err(SyncUtilityError::TargetLocked {
                    path: item.target.clone(),
                    owner: status.owner,
                });
            }
            Err(e) => {
                return Err(SyncUtilityError::from_io_error(
                    e,
                    "copying",
                    Some(item.target.clone()),
                ))
            }
        };

        // Carry the source modification time; a failure here is cosmetic
        if let Ok(mtime) = source_meta.modified() {
            let _ = filetime::set_file_mtime(
                &item.target,
                filetime::FileTime::from_system_time(mtime),
            );
        }

        // A mismatch means a truncated or corrupted copy; hard per-item
        // error, never silently accepted
        let actual = self.computer.hash_file(&item.target)?;
        if actual != expected {
            return Err(SyncUtilityError::IntegrityMismatch {
                path: item.target.clone(),
                expected,
                actual,
            });
        }

        let target_meta = fs::metadata(&item.target).map_err(|e| {
            SyncUtilityError::from_io_error(e, "reading target", Some(item.target.clone()))
        })?;
        catalog.upsert(FileRecord {
            path: item.target.clone(),
            name: basename(&item.target),
            size: target_meta.len(),
            content_hash: actual,
            created_at: target_meta.created().ok().map(DateTime::<Utc>::from),
            modified_at: target_meta.modified().ok().map(DateTime::<Utc>::from),
        });

        audit.record(
            AuditRecord::new(
                AuditKind::Sync,
                format!(
                    "Synced {} to {}",
                    item.source.display(),
                    item.target.display()
                ),
                &item.target,
            )
            .with_bytes(bytes)
            .with_actor(self.actor.clone()),
        );

        Ok(ItemOutcome {
            source: Some(item.source.clone()),
            target: item.target.clone(),
            status: ItemStatus::Copied,
            detail: None,
            bytes,
        })
    }

    fn try_delete(
        &self,
        path: &Path,
        catalog: &CatalogStore,
        audit: &dyn AuditSink,
    ) -> Result<ItemOutcome, SyncUtilityError> {
        let meta = fs::metadata(path).map_err(|e| {
            SyncUtilityError::from_io_error(e, "deleting", Some(path.to_path_buf()))
        })?;
        let bytes = meta.len();

        let status = self.probe.probe(path);
        if status.locked {
            return Err(SyncUtilityError::TargetLocked {
                path: path.to_path_buf(),
                owner: status.owner,
            });
        }

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                let status = self.probe.probe(path);
                return Err(SyncUtilityError::TargetLocked {
                    path: path.to_path_buf(),
                    owner: status.owner,
                });
            }
            Err(e) => {
                return Err(SyncUtilityError::from_io_error(
                    e,
                    "deleting",
                    Some(path.to_path_buf()),
                ))
            }
        }

        catalog.remove(path);
        audit.record(
            AuditRecord::new(
                AuditKind::Delete,
                format!("Deleted file: {}", path.display()),
                path,
            )
            .with_bytes(bytes)
            .with_actor(self.actor.clone()),
        );

        Ok(ItemOutcome {
            source: None,
            target: path.to_path_buf(),
            status: ItemStatus::Deleted,
            detail: None,
            bytes,
        })
    }
}

impl Default for ResolutionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Target path mirroring the record's location relative to its own root
fn relative_target(folder_from: &Path, folder_to: &Path, record: &FileRecord) -> PathBuf {
    match record.path.strip_prefix(folder_from) {
        Ok(rel) => folder_to.join(rel),
        Err(_) => folder_to.join(&record.name),
    }
}

/// Variant name for the nth retained conflict copy from one side
fn variant_name(name: &str, origin: Side, ordinal: usize) -> String {
    let base = conflict_variant_name(name, origin);
    if ordinal == 0 {
        return base;
    }
    let path = Path::new(&base);
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}-{}{}", stem, ordinal + 1, ext)
}
