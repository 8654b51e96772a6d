// Tests for resolution strategies and the copy protocol

use std::fs;
use std::path::{Path, PathBuf};

use docusync::audit::{AuditKind, MemoryAuditSink};
use docusync::catalog::{hash_bytes, CatalogStore};
use docusync::reconcile::{CancelFlag, ReconcileEngine, ReconciliationResult};
use docusync::resolve::{
    CopyReason, ManualDecision, PlannedCopy, ResolutionExecutor, ResolveStrategy, SyncPlan,
};
use filetime::{set_file_mtime, FileTime};
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn analyze(folder_a: &Path, folder_b: &Path, store: &CatalogStore) -> ReconciliationResult {
    ReconcileEngine::new().analyze(store, folder_a, folder_b).unwrap()
}

#[test]
fn test_uniques_copied_both_directions() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    write_file(&a, "sub/only_a.txt", b"from a");
    write_file(&b, "only_b.txt", b"from b");

    let store = CatalogStore::new();
    let analysis = analyze(&a, &b, &store);

    let executor = ResolutionExecutor::new();
    let plan = executor.build_plan(&analysis, ResolveStrategy::KeepBoth);
    assert_eq!(plan.copies.len(), 2);

    let audit = MemoryAuditSink::new();
    let outcome = executor.execute(&plan, &store, &audit);

    assert_eq!(outcome.copied, 2);
    assert_eq!(outcome.failed, 0);
    // Relative location is preserved on the receiving side
    assert_eq!(fs::read(b.join("sub/only_a.txt")).unwrap(), b"from a");
    assert_eq!(fs::read(a.join("only_b.txt")).unwrap(), b"from b");
    // The catalog learned both new targets
    assert!(store.get(&b.join("sub/only_a.txt")).is_some());
    assert!(store.get(&a.join("only_b.txt")).is_some());
    assert_eq!(audit.len(), 2);
}

#[test]
fn test_keep_newest_overwrites_loser() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let old = write_file(&a, "notes.txt", b"old content");
    let new = write_file(&b, "notes.txt", b"new content!");
    set_file_mtime(&old, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    set_file_mtime(&new, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let store = CatalogStore::new();
    let analysis = analyze(&a, &b, &store);
    assert_eq!(analysis.conflicts.len(), 1);

    let executor = ResolutionExecutor::new();
    let plan = executor.build_plan(&analysis, ResolveStrategy::KeepNewest);
    assert_eq!(plan.copies.len(), 1);
    assert_eq!(plan.copies[0].source, new);
    assert_eq!(plan.copies[0].target, old);

    let audit = MemoryAuditSink::new();
    let outcome = executor.execute(&plan, &store, &audit);
    assert_eq!(outcome.copied, 1);
    assert_eq!(outcome.failed, 0);

    // The winner's bytes land on the losing side, verified by re-hash
    assert_eq!(fs::read(&old).unwrap(), b"new content!");
    assert_eq!(store.get(&old).unwrap().content_hash, hash_bytes(b"new content!"));
}

#[test]
fn test_keep_largest_wins_by_size() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    write_file(&a, "doc.txt", &[1u8; 200]);
    write_file(&b, "doc.txt", &[2u8; 50]);

    let store = CatalogStore::new();
    let analysis = analyze(&a, &b, &store);

    let executor = ResolutionExecutor::new();
    let plan = executor.build_plan(&analysis, ResolveStrategy::KeepLargest);
    assert_eq!(plan.copies.len(), 1);
    assert_eq!(plan.copies[0].source, a.join("doc.txt"));
    assert_eq!(plan.copies[0].target, b.join("doc.txt"));

    let audit = MemoryAuditSink::new();
    let outcome = executor.execute(&plan, &store, &audit);
    assert_eq!(outcome.copied, 1);
    assert_eq!(fs::read(b.join("doc.txt")).unwrap(), vec![1u8; 200]);
}

#[test]
fn test_keep_both_retains_suffixed_variants() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    write_file(&a, "notes.txt", b"version a");
    write_file(&b, "notes.txt", b"version b");

    let store = CatalogStore::new();
    let analysis = analyze(&a, &b, &store);

    let executor = ResolutionExecutor::new();
    let plan = executor.build_plan(&analysis, ResolveStrategy::KeepBoth);
    let audit = MemoryAuditSink::new();
    let outcome = executor.execute(&plan, &store, &audit);

    assert_eq!(outcome.copied, 2);
    // Originals untouched, variants disambiguated by origin side
    assert_eq!(fs::read(a.join("notes.txt")).unwrap(), b"version a");
    assert_eq!(fs::read(b.join("notes.txt")).unwrap(), b"version b");
    assert_eq!(fs::read(a.join("notes.from-b.txt")).unwrap(), b"version b");
    assert_eq!(fs::read(b.join("notes.from-a.txt")).unwrap(), b"version a");
}

#[test]
fn test_second_run_skips_identical_targets() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    write_file(&a, "only_a.txt", b"payload");
    fs::create_dir_all(&b).unwrap();

    let store = CatalogStore::new();
    let analysis = analyze(&a, &b, &store);
    let executor = ResolutionExecutor::new();
    let plan = executor.build_plan(&analysis, ResolveStrategy::KeepBoth);
    let audit = MemoryAuditSink::new();

    let first = executor.execute(&plan, &store, &audit);
    assert_eq!(first.copied, 1);

    // Replaying the same plan finds identical targets: skipped, not re-copied
    let second = executor.execute(&plan, &store, &audit);
    assert_eq!(second.copied, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.failed, 0);
    // Only the real copy was audited
    assert_eq!(audit.len(), 1);
}

#[test]
fn test_integrity_mismatch_is_hard_error() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let source = write_file(&a, "data.txt", b"actual bytes");
    fs::create_dir_all(&b).unwrap();

    // A plan whose expected hash cannot match simulates a corrupted copy
    let plan = SyncPlan {
        copies: vec![PlannedCopy {
            source,
            target: b.join("data.txt"),
            expected_hash: Some("0".repeat(32)),
            size: 12,
            reason: CopyReason::MissingOnA,
        }],
        deletes: Vec::new(),
    };

    let store = CatalogStore::new();
    let audit = MemoryAuditSink::new();
    let outcome = ResolutionExecutor::new().execute(&plan, &store, &audit);

    assert_eq!(outcome.copied, 0);
    assert_eq!(outcome.failed, 1);
    let errors = outcome.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].detail.as_deref().unwrap().contains("Hash mismatch"));
    // A failed item is never recorded as synced
    assert!(audit.is_empty());
    assert!(store.get(&b.join("data.txt")).is_none());
}

#[test]
fn test_one_failure_does_not_abort_batch() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let good = write_file(&a, "good.txt", b"good");
    fs::create_dir_all(&b).unwrap();

    let plan = SyncPlan {
        copies: vec![
            PlannedCopy {
                source: a.join("vanished.txt"),
                target: b.join("vanished.txt"),
                expected_hash: None,
                size: 0,
                reason: CopyReason::MissingOnA,
            },
            PlannedCopy {
                source: good.clone(),
                target: b.join("good.txt"),
                expected_hash: Some(hash_bytes(b"good")),
                size: 4,
                reason: CopyReason::MissingOnA,
            },
        ],
        deletes: Vec::new(),
    };

    let store = CatalogStore::new();
    let audit = MemoryAuditSink::new();
    let outcome = ResolutionExecutor::new().execute(&plan, &store, &audit);

    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.copied, 1);
    assert_eq!(fs::read(b.join("good.txt")).unwrap(), b"good");
}

#[test]
fn test_manual_decisions_copy_and_delete() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let keep_src = write_file(&a, "keep.txt", b"keep me");
    let doomed = write_file(&b, "doomed.txt", b"delete me");

    let store = CatalogStore::new();
    let computer = docusync::catalog::HashComputer::new();
    store.index_path(&doomed, &computer).unwrap();

    let executor = ResolutionExecutor::new();
    let decisions = vec![
        ManualDecision::Copy { source: keep_src.clone(), target: b.join("keep.txt") },
        ManualDecision::Delete { path: doomed.clone() },
    ];
    let plan = executor.plan_from_decisions(&decisions);
    assert_eq!(plan.copies.len(), 1);
    assert_eq!(plan.deletes.len(), 1);

    let audit = MemoryAuditSink::new();
    let outcome = executor.execute(&plan, &store, &audit);

    assert_eq!(outcome.copied, 1);
    assert_eq!(outcome.deleted, 1);
    assert!(!doomed.exists());
    assert!(store.get(&doomed).is_none());

    let kinds: Vec<AuditKind> = audit.entries().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&AuditKind::Sync));
    assert!(kinds.contains(&AuditKind::Delete));
}

#[test]
fn test_audit_records_carry_bytes() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    write_file(&a, "payload.txt", &[9u8; 321]);
    fs::create_dir_all(&b).unwrap();

    let store = CatalogStore::new();
    let analysis = analyze(&a, &b, &store);
    let executor = ResolutionExecutor::new().with_actor("tester");
    let plan = executor.build_plan(&analysis, ResolveStrategy::KeepBoth);

    let audit = MemoryAuditSink::new();
    executor.execute(&plan, &store, &audit);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].bytes, 321);
    assert_eq!(entries[0].count, 1);
    assert_eq!(entries[0].actor.as_deref(), Some("tester"));
}

#[test]
fn test_cancelled_executor_stops_before_items() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    write_file(&a, "one.txt", b"one");
    fs::create_dir_all(&b).unwrap();

    let store = CatalogStore::new();
    let analysis = analyze(&a, &b, &store);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let executor = ResolutionExecutor::new().with_cancel_flag(cancel);
    let plan = executor.build_plan(&analysis, ResolveStrategy::KeepBoth);

    let audit = MemoryAuditSink::new();
    let outcome = executor.execute(&plan, &store, &audit);

    assert!(outcome.incomplete);
    assert!(outcome.items.is_empty());
    assert!(!b.join("one.txt").exists());
}

#[test]
fn test_unknown_strategy_fails_before_any_mutation() {
    let err = "newest_wins".parse::<ResolveStrategy>().unwrap_err();
    assert!(matches!(err, docusync::error::SyncUtilityError::InvalidStrategy { .. }));
}
