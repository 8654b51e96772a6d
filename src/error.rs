// Centralized error handling module
// Provides context-rich error types for catalog, reconciliation and sync operations

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for the sync utility
/// Carries file paths and operation context so batch reports stay readable
#[derive(Debug)]
pub enum SyncUtilityError {
    /// A scan root or referenced source file does not exist
    PathNotFound { path: PathBuf },
    DirectoryNotFound { path: PathBuf },

    /// Permission denied or I/O failure while reading/hashing a single file
    UnreadableFile { path: PathBuf, operation: String },
    IoError { path: Option<PathBuf>, operation: String, source: io::Error },

    /// Post-copy re-hash disagrees with the source hash
    IntegrityMismatch { path: PathBuf, expected: String, actual: String },

    /// Destination could not be overwritten or deleted because another process holds it
    TargetLocked { path: PathBuf, owner: Option<String> },

    /// Unrecognized resolution strategy name
    InvalidStrategy { strategy: String },

    /// Cooperative cancellation observed before the operation could finish
    Cancelled,
}

impl fmt::Display for SyncUtilityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyncUtilityError::PathNotFound { path } => {
                writeln!(f, "File not found: {}", path.display())?;
                write!(f, "Suggestion: Check that the path is correct and the file exists")
            }
            SyncUtilityError::DirectoryNotFound { path } => {
                writeln!(f, "Directory not found: {}", path.display())?;
                write!(f, "Suggestion: Check that the directory path is correct and the directory exists")
            }
            SyncUtilityError::UnreadableFile { path, operation } => {
                writeln!(f, "Cannot read file while {}: {}", operation, path.display())?;
                write!(f, "Suggestion: Check file permissions or run with appropriate privileges")
            }
            SyncUtilityError::IoError { path, operation, source } => {
                if let Some(p) = path {
                    writeln!(f, "I/O error while {} file {}: {}", operation, p.display(), source)?;
                } else {
                    writeln!(f, "I/O error while {}: {}", operation, source)?;
                }
                write!(f, "Suggestion: Check file permissions and disk space")
            }
            SyncUtilityError::IntegrityMismatch { path, expected, actual } => {
                writeln!(f, "Hash mismatch after copying {}", path.display())?;
                writeln!(f, "  Expected: {}", expected)?;
                writeln!(f, "  Actual:   {}", actual)?;
                write!(f, "Suggestion: The copy may be truncated or corrupted; delete the target and retry")
            }
            SyncUtilityError::TargetLocked { path, owner } => {
                match owner {
                    Some(owner) => {
                        writeln!(f, "File is in use by {}: {}", owner, path.display())?;
                    }
                    None => {
                        writeln!(f, "File is in use by another process: {}", path.display())?;
                    }
                }
                write!(f, "Suggestion: Close the program holding the file open and retry")
            }
            SyncUtilityError::InvalidStrategy { strategy } => {
                writeln!(f, "Unknown resolution strategy: {}", strategy)?;
                write!(f, "Suggestion: Use one of keep_both, keep_newest, keep_largest")
            }
            SyncUtilityError::Cancelled => {
                write!(f, "Operation cancelled")
            }
        }
    }
}

impl std::error::Error for SyncUtilityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncUtilityError::IoError { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl SyncUtilityError {
    /// Create an error from an io::Error with context about the operation and optional path
    pub fn from_io_error(err: io::Error, operation: &str, path: Option<PathBuf>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => {
                if let Some(p) = path {
                    if operation.contains("directory") || operation.contains("scan") {
                        SyncUtilityError::DirectoryNotFound { path: p }
                    } else {
                        SyncUtilityError::PathNotFound { path: p }
                    }
                } else {
                    SyncUtilityError::IoError {
                        path: None,
                        operation: operation.to_string(),
                        source: err,
                    }
                }
            }
            io::ErrorKind::PermissionDenied => {
                if let Some(p) = path {
                    SyncUtilityError::UnreadableFile {
                        path: p,
                        operation: operation.to_string(),
                    }
                } else {
                    SyncUtilityError::IoError {
                        path: None,
                        operation: operation.to_string(),
                        source: err,
                    }
                }
            }
            _ => SyncUtilityError::IoError {
                path,
                operation: operation.to_string(),
                source: err,
            },
        }
    }

    /// One-line rendering for per-item error lists in batch outcomes
    pub fn brief(&self) -> String {
        self.to_string().lines().next().unwrap_or_default().to_string()
    }
}

impl From<io::Error> for SyncUtilityError {
    fn from(err: io::Error) -> Self {
        SyncUtilityError::from_io_error(err, "unknown operation", None)
    }
}
