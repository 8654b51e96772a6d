// Directory scanning module
// Walks directory trees and indexes discovered files into the catalog

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use jwalk::WalkDir;
use rayon::prelude::*;
use serde::Serialize;

use super::hash::HashComputer;
use super::store::CatalogStore;
use crate::config::ScanConfig;
use crate::error::SyncUtilityError;
use crate::reconcile::progress::CancelFlag;

/// Statistics collected while indexing a tree
#[derive(Debug, Clone, Serialize)]
pub struct ScanStats {
    pub files_indexed: usize,
    pub files_failed: usize,
    pub total_bytes: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Progress information emitted while indexing
#[derive(Debug, Clone, Serialize)]
pub struct IndexProgress {
    pub files_indexed: usize,
    pub current_file: String,
    pub bytes_indexed: u64,
}

/// Type alias for the indexing progress callback
pub type IndexCallback = Box<dyn Fn(IndexProgress) + Send + Sync>;

/// Engine for walking directory trees and keeping the catalog current
pub struct ScanEngine {
    computer: HashComputer,
    config: ScanConfig,
    cancel: Option<CancelFlag>,
    progress_callback: Option<Arc<IndexCallback>>,
    show_bar: bool,
}

impl ScanEngine {
    pub fn new() -> Self {
        Self {
            computer: HashComputer::new(),
            config: ScanConfig::default(),
            cancel: None,
            progress_callback: None,
            show_bar: false,
        }
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self {
            computer: HashComputer::new(),
            config,
            cancel: None,
            progress_callback: None,
            show_bar: false,
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(IndexProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Show an indicatif progress bar while indexing (no-op off a terminal)
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_bar = show;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
    }

    /// Recursively collect file paths under `root` that pass the extension
    /// allow-list. Hidden entries are skipped, symlinks are never followed,
    /// so the walk cannot escape `root`. Results are sorted.
    pub fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>, SyncUtilityError> {
        if !root.exists() {
            return Err(SyncUtilityError::PathNotFound { path: root.to_path_buf() });
        }
        if !root.is_dir() {
            return Err(SyncUtilityError::DirectoryNotFound { path: root.to_path_buf() });
        }

        let mut files = Vec::new();
        self.collect_files_recursive(root, &mut files);
        files.sort();
        Ok(files)
    }

    fn collect_files_recursive(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                // Unreadable subdirectories never stop the scan
                eprintln!("Warning: Cannot read directory {}: {}", dir.display(), e);
                return;
            }
        };

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    eprintln!("Warning: Cannot read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();

            if self.config.skip_hidden && is_hidden(&path) {
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    eprintln!("Warning: Cannot read metadata for {}: {}", path.display(), e);
                    continue;
                }
            };

            if file_type.is_symlink() && !self.config.follow_links {
                continue;
            }

            if file_type.is_dir() {
                self.collect_files_recursive(&path, files);
            } else if file_type.is_file() && self.config.matches_extension(&path) {
                files.push(path);
            }
        }
    }

    /// Walk `root` and (re)index every matching file into the catalog.
    /// Stale records under `root` are dropped first so the catalog never
    /// keeps ghost entries. Returns `Cancelled` if the flag is raised.
    pub fn index_tree(&self, root: &Path, store: &CatalogStore) -> Result<ScanStats, SyncUtilityError> {
        let start_time = Instant::now();

        if self.is_cancelled() {
            return Err(SyncUtilityError::Cancelled);
        }

        store.reconcile_stale(root);

        if self.config.parallel {
            return self.index_tree_parallel(root, store, start_time);
        }

        let files = self.collect_files(root)?;

        let pb = self.make_bar(files.len() as u64);

        let mut files_indexed = 0usize;
        let mut files_failed = 0usize;
        let mut total_bytes = 0u64;

        for path in &files {
            if self.is_cancelled() {
                pb.finish_and_clear();
                return Err(SyncUtilityError::Cancelled);
            }

            match store.index_path(path, &self.computer) {
                Some(record) => {
                    files_indexed += 1;
                    total_bytes += record.size;

                    if let Some(ref callback) = self.progress_callback {
                        callback(IndexProgress {
                            files_indexed,
                            current_file: record.name.clone(),
                            bytes_indexed: total_bytes,
                        });
                    }
                }
                None => files_failed += 1,
            }

            pb.set_message(format!("{} OK, {} failed", files_indexed, files_failed));
            pb.inc(1);
        }

        pb.finish_and_clear();

        Ok(ScanStats {
            files_indexed,
            files_failed,
            total_bytes,
            duration: start_time.elapsed(),
        })
    }

    /// Parallel indexing: a walker thread streams discovered paths into a
    /// bounded channel while rayon workers hash and upsert them
    fn index_tree_parallel(
        &self,
        root: &Path,
        store: &CatalogStore,
        start_time: Instant,
    ) -> Result<ScanStats, SyncUtilityError> {
        if !root.exists() {
            return Err(SyncUtilityError::PathNotFound { path: root.to_path_buf() });
        }
        if !root.is_dir() {
            return Err(SyncUtilityError::DirectoryNotFound { path: root.to_path_buf() });
        }

        let files_indexed = Arc::new(Mutex::new(0usize));
        let files_failed = Arc::new(Mutex::new(0usize));
        let total_bytes = Arc::new(Mutex::new(0u64));

        let pb = self.make_spinner();

        // Bounded channel applies backpressure when hashing lags the walk
        let (sender, receiver) = bounded::<PathBuf>(10000);

        let walker_root = root.to_path_buf();
        let walker_config = self.config.clone();
        let walker_cancel = self.cancel.clone();

        let walker_handle = thread::spawn(move || {
            Self::walk_streaming(&walker_root, sender, &walker_config, walker_cancel)
        });

        let files_indexed_clone = Arc::clone(&files_indexed);
        let files_failed_clone = Arc::clone(&files_failed);
        let total_bytes_clone = Arc::clone(&total_bytes);
        let pb_clone = pb.clone();
        let progress_callback = self.progress_callback.clone();

        receiver.into_iter().par_bridge().for_each(|path| {
            let computer = HashComputer::new();
            match store.index_path(&path, &computer) {
                Some(record) => {
                    let mut bytes = total_bytes_clone.lock().unwrap();
                    *bytes += record.size;
                    let current_bytes = *bytes;
                    drop(bytes);

                    let mut indexed = files_indexed_clone.lock().unwrap();
                    *indexed += 1;
                    let current_indexed = *indexed;
                    drop(indexed);

                    if let Some(ref callback) = progress_callback {
                        callback(IndexProgress {
                            files_indexed: current_indexed,
                            current_file: record.name.clone(),
                            bytes_indexed: current_bytes,
                        });
                    }
                }
                None => {
                    let mut failed = files_failed_clone.lock().unwrap();
                    *failed += 1;
                }
            }

            let indexed = *files_indexed_clone.lock().unwrap();
            let failed = *files_failed_clone.lock().unwrap();
            pb_clone.set_message(format!("{} OK, {} failed", indexed, failed));
            pb_clone.inc(1);
        });

        if let Err(e) = walker_handle.join() {
            eprintln!("Warning: Walker thread panicked: {:?}", e);
        }

        pb.finish_and_clear();

        if self.is_cancelled() {
            return Err(SyncUtilityError::Cancelled);
        }

        let files_indexed = *files_indexed.lock().unwrap();
        let files_failed = *files_failed.lock().unwrap();
        let total_bytes = *total_bytes.lock().unwrap();
        Ok(ScanStats {
            files_indexed,
            files_failed,
            total_bytes,
            duration: start_time.elapsed(),
        })
    }

    /// Producer side of the parallel scan: jwalk traversal feeding the channel
    fn walk_streaming(
        root: &Path,
        sender: Sender<PathBuf>,
        config: &ScanConfig,
        cancel: Option<CancelFlag>,
    ) {
        for entry_result in WalkDir::new(root)
            .parallelism(jwalk::Parallelism::RayonNewPool(0))
            .skip_hidden(config.skip_hidden)
            .follow_links(config.follow_links)
        {
            if cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false) {
                break;
            }

            match entry_result {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !config.matches_extension(&path) {
                        continue;
                    }

                    // Blocks when the channel is full; stops if the
                    // consumers are gone
                    if sender.send(path).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("Warning: Error walking directory: {}", e);
                }
            }
        }
    }

    fn make_bar(&self, len: u64) -> ProgressBar {
        if !self.show_bar {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) | {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb
    }

    fn make_spinner(&self) -> ProgressBar {
        if !self.show_bar {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("[{elapsed_precise}] {pos} files | {msg}")
                .unwrap(),
        );
        pb
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
