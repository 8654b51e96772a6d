//! Resolution strategies for reconciled folder trees.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::catalog::FileRecord;
use crate::error::SyncUtilityError;

/// Strategy applied to a reconciliation result during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStrategy {
    /// Copy every unique file across; retain both sides of each conflict
    /// under names disambiguated by origin side (default).
    #[default]
    KeepBoth,
    /// The record with the later modification time wins a conflict and
    /// overwrites the other side.
    KeepNewest,
    /// The larger record wins a conflict.
    KeepLargest,
}

impl ResolveStrategy {
    /// Get a human-readable description of the strategy.
    pub fn description(&self) -> &'static str {
        match self {
            Self::KeepBoth => "Keep both versions (rename conflicts by origin side)",
            Self::KeepNewest => "Use most recently modified file",
            Self::KeepLargest => "Use largest file",
        }
    }
}

impl fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::KeepBoth => "keep_both",
            Self::KeepNewest => "keep_newest",
            Self::KeepLargest => "keep_largest",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ResolveStrategy {
    type Err = SyncUtilityError;

    /// Unknown names fail fast, before any filesystem mutation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep_both" | "keep-both" => Ok(Self::KeepBoth),
            "keep_newest" | "keep-newest" => Ok(Self::KeepNewest),
            "keep_largest" | "keep-largest" => Ok(Self::KeepLargest),
            _ => Err(SyncUtilityError::InvalidStrategy { strategy: s.to_string() }),
        }
    }
}

/// One side of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Disambiguated filename for a conflict copy retained next to the local
/// version, e.g. `notes.txt` from side B becomes `notes.from-b.txt`.
pub fn conflict_variant_name(name: &str, origin: Side) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}.from-{}{}", stem, origin.label(), ext)
}

/// Winner of a conflict under `keep_newest`: later modification time, falling
/// back to creation time, then to a live mtime probe when the catalog has no
/// timestamps. Side A wins ties and fully unknown cases.
pub fn newest_winner(a: &FileRecord, b: &FileRecord) -> Side {
    let time_a = a.best_timestamp().or_else(|| live_mtime(&a.path));
    let time_b = b.best_timestamp().or_else(|| live_mtime(&b.path));

    match (time_a, time_b) {
        (Some(ta), Some(tb)) => {
            if tb > ta {
                Side::B
            } else {
                Side::A
            }
        }
        (Some(_), None) => Side::A,
        (None, Some(_)) => Side::B,
        (None, None) => Side::A,
    }
}

/// Winner of a conflict under `keep_largest`. Side A wins ties.
pub fn largest_winner(a: &FileRecord, b: &FileRecord) -> Side {
    if b.size > a.size {
        Side::B
    } else {
        Side::A
    }
}

fn live_mtime(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// An explicit per-file decision supplied by the caller instead of one of
/// the named strategies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualDecision {
    Copy { source: PathBuf, target: PathBuf },
    Delete { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(path: &str, size: u64, modified: Option<DateTime<Utc>>) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            name: Path::new(path)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned(),
            size,
            content_hash: "0".repeat(32),
            created_at: None,
            modified_at: modified,
        }
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("keep_both".parse::<ResolveStrategy>().unwrap(), ResolveStrategy::KeepBoth);
        assert_eq!("keep-newest".parse::<ResolveStrategy>().unwrap(), ResolveStrategy::KeepNewest);
        assert_eq!("KEEP_LARGEST".parse::<ResolveStrategy>().unwrap(), ResolveStrategy::KeepLargest);

        let err = "mirror".parse::<ResolveStrategy>().unwrap_err();
        assert!(matches!(err, SyncUtilityError::InvalidStrategy { .. }));
    }

    #[test]
    fn test_newest_winner() {
        let older = record("/a/f.txt", 10, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let newer = record("/b/f.txt", 10, Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()));

        assert_eq!(newest_winner(&older, &newer), Side::B);
        assert_eq!(newest_winner(&newer, &older), Side::A);
        // A wins exact ties
        assert_eq!(newest_winner(&older, &older), Side::A);
    }

    #[test]
    fn test_largest_winner() {
        let small = record("/a/f.txt", 10, None);
        let large = record("/b/f.txt", 20, None);

        assert_eq!(largest_winner(&small, &large), Side::B);
        assert_eq!(largest_winner(&large, &small), Side::A);
        assert_eq!(largest_winner(&small, &small), Side::A);
    }

    #[test]
    fn test_conflict_variant_name() {
        assert_eq!(conflict_variant_name("notes.txt", Side::B), "notes.from-b.txt");
        assert_eq!(conflict_variant_name("archive.tar.gz", Side::A), "archive.tar.from-a.gz");
        assert_eq!(conflict_variant_name("README", Side::A), "README.from-a");
    }
}
