// Tests for catalog indexing, hashing and stale-record reconciliation

use std::fs;
use std::path::Path;

use docusync::catalog::{CatalogStore, HashComputer, ScanEngine};
use docusync::config::ScanConfig;
use docusync::error::SyncUtilityError;
use docusync::reconcile::CancelFlag;
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_hash_file_streaming() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "hello.txt", b"hello");

    let computer = HashComputer::new();
    assert_eq!(computer.hash_file(&path).unwrap(), "5d41402abc4b2a76b9719d911017c592");

    // Chunk size smaller than the content must produce the same digest
    let small_chunks = HashComputer::with_chunk_size(2);
    assert_eq!(small_chunks.hash_file(&path).unwrap(), "5d41402abc4b2a76b9719d911017c592");
}

#[test]
fn test_zero_byte_file_hashes_to_empty_digest() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "empty.txt", b"");

    let computer = HashComputer::new();
    assert_eq!(computer.hash_file(&path).unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
}

#[test]
fn test_index_path_upserts_record() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "doc.txt", b"first version");

    let store = CatalogStore::new();
    let computer = HashComputer::new();

    let record = store.index_path(&path, &computer).unwrap();
    assert_eq!(record.name, "doc.txt");
    assert_eq!(record.size, 13);
    assert!(record.modified_at.is_some());

    // Re-indexing after a change refreshes hash and size in place
    fs::write(&path, b"second, longer version").unwrap();
    let refreshed = store.index_path(&path, &computer).unwrap();
    assert_ne!(refreshed.content_hash, record.content_hash);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&path).unwrap().content_hash, refreshed.content_hash);
}

#[test]
fn test_index_path_is_best_effort() {
    let dir = tempdir().unwrap();
    let store = CatalogStore::new();
    let computer = HashComputer::new();

    // Missing file: no record, no panic
    assert!(store.index_path(&dir.path().join("absent.txt"), &computer).is_none());
    // Directories are not regular files
    assert!(store.index_path(dir.path(), &computer).is_none());
    assert!(store.is_empty());
}

#[test]
fn test_reconcile_stale_is_scoped() {
    let dir = tempdir().unwrap();
    let kept = write_file(dir.path(), "a/kept.txt", b"kept");
    let ghost = write_file(dir.path(), "a/ghost.txt", b"ghost");
    let other = write_file(dir.path(), "b/other.txt", b"other");

    let store = CatalogStore::new();
    let computer = HashComputer::new();
    store.index_path(&kept, &computer).unwrap();
    store.index_path(&ghost, &computer).unwrap();
    store.index_path(&other, &computer).unwrap();

    fs::remove_file(&ghost).unwrap();
    fs::remove_file(&other).unwrap();

    // Only records under a/ are swept; b/ keeps its ghost
    let removed = store.reconcile_stale(&dir.path().join("a"));
    assert_eq!(removed, 1);
    assert!(store.get(&kept).is_some());
    assert!(store.get(&ghost).is_none());
    assert!(store.get(&other).is_some());
}

#[test]
fn test_records_under_sorted_by_path() {
    let dir = tempdir().unwrap();
    let store = CatalogStore::new();
    let computer = HashComputer::new();

    for name in ["z.txt", "a.txt", "m/inner.txt"] {
        let path = write_file(dir.path(), name, b"x");
        store.index_path(&path, &computer).unwrap();
    }

    let records = store.records_under(dir.path());
    assert_eq!(records.len(), 3);
    let paths: Vec<_> = records.iter().map(|r| r.path.clone()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[test]
fn test_collect_files_filters_extensions_and_hidden_dirs() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "book.pdf", b"pdf");
    write_file(dir.path(), "notes.txt", b"txt");
    write_file(dir.path(), "binary.exe", b"exe");
    write_file(dir.path(), ".git/config.txt", b"hidden");
    write_file(dir.path(), "sub/inner.txt", b"inner");

    let scan = ScanEngine::new();
    let files = scan.collect_files(dir.path()).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert!(names.contains(&"book.pdf".to_string()));
    assert!(names.contains(&"notes.txt".to_string()));
    assert!(names.contains(&"inner.txt".to_string()));
    assert!(!names.contains(&"binary.exe".to_string()));
    assert!(!names.contains(&"config.txt".to_string()));
}

#[test]
fn test_collect_files_missing_root_errors() {
    let dir = tempdir().unwrap();
    let scan = ScanEngine::new();
    let err = scan.collect_files(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, SyncUtilityError::PathNotFound { .. }));
}

#[test]
fn test_index_tree_counts_and_ghost_cleanup() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "one.txt", b"one");
    write_file(dir.path(), "two.txt", b"twotwo");

    let store = CatalogStore::new();
    let scan = ScanEngine::new();

    let stats = scan.index_tree(dir.path(), &store).unwrap();
    assert_eq!(stats.files_indexed, 2);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(stats.total_bytes, 9);

    // A deleted file disappears from the catalog on the next tree scan
    fs::remove_file(dir.path().join("one.txt")).unwrap();
    let stats = scan.index_tree(dir.path(), &store).unwrap();
    assert_eq!(stats.files_indexed, 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_parallel_index_tree_matches_sequential() {
    let dir = tempdir().unwrap();
    for i in 0..25 {
        write_file(dir.path(), &format!("file{:02}.txt", i), format!("content {}", i).as_bytes());
    }

    let sequential_store = CatalogStore::new();
    let sequential = ScanEngine::new().index_tree(dir.path(), &sequential_store).unwrap();

    let parallel_store = CatalogStore::new();
    let mut config = ScanConfig::default();
    config.parallel = true;
    let parallel = ScanEngine::with_config(config).index_tree(dir.path(), &parallel_store).unwrap();

    assert_eq!(sequential.files_indexed, 25);
    assert_eq!(parallel.files_indexed, 25);
    assert_eq!(parallel.total_bytes, sequential.total_bytes);
    assert_eq!(parallel_store.len(), sequential_store.len());

    // Same records either way
    for record in sequential_store.records_under(dir.path()) {
        let other = parallel_store.get(&record.path).unwrap();
        assert_eq!(other.content_hash, record.content_hash);
    }
}

#[test]
fn test_index_tree_cancelled_before_start() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "one.txt", b"one");

    let cancel = CancelFlag::new();
    cancel.cancel();

    let store = CatalogStore::new();
    let scan = ScanEngine::new().with_cancel_flag(cancel);
    let err = scan.index_tree(dir.path(), &store).unwrap_err();
    assert!(matches!(err, SyncUtilityError::Cancelled));
}
