// Catalog record type
// One entry per indexed file: path, size, content hash and timestamps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::hash::HashComputer;
use crate::error::SyncUtilityError;

/// One entry in the catalog. The path is the unique key; the content hash is
/// recomputed every time the path is (re)indexed, never trusted stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute filesystem path
    pub path: PathBuf,
    /// Basename including extension. Reconciliation matches records by this
    /// name across trees, tolerating moves between subdirectories.
    pub name: String,
    /// Byte length
    pub size: u64,
    /// Hex-encoded MD5 of the full file content
    pub content_hash: String,
    pub created_at: Option<DateTime<Utc>>,
    /// May be absent; an absent timestamp means unknown, not epoch zero
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Build a record by probing filesystem metadata and hashing the content.
    /// Fails for missing paths, non-regular files and unreadable content.
    pub fn from_path(path: &Path, computer: &HashComputer) -> Result<FileRecord, SyncUtilityError> {
        let metadata = fs::metadata(path).map_err(|e| {
            SyncUtilityError::from_io_error(e, "indexing", Some(path.to_path_buf()))
        })?;

        if !metadata.is_file() {
            return Err(SyncUtilityError::UnreadableFile {
                path: path.to_path_buf(),
                operation: "indexing (not a regular file)".to_string(),
            });
        }

        let content_hash = computer.hash_file(path)?;

        Ok(FileRecord {
            path: path.to_path_buf(),
            name: basename(path),
            size: metadata.len(),
            content_hash,
            created_at: metadata.created().ok().map(DateTime::<Utc>::from),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// The timestamp used for "newest" comparisons: modification time,
    /// falling back to creation time
    pub fn best_timestamp(&self) -> Option<DateTime<Utc>> {
        self.modified_at.or(self.created_at)
    }
}

/// Basename of a path as a string, lossy for non-UTF-8 names
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
