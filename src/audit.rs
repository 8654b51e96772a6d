// Activity audit trail
// Every executed copy or delete appends one structured record to a sink;
// the core only ever appends, it never reads the log back

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Kind of audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A file was copied to the other side of a reconciliation
    Sync,
    /// A file was deleted (duplicate elimination or an explicit decision)
    Delete,
}

/// One entry in the activity log
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub kind: AuditKind,
    pub description: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub count: usize,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(kind: AuditKind, description: impl Into<String>, path: &Path) -> Self {
        Self {
            kind,
            description: description.into(),
            path: path.to_path_buf(),
            bytes: 0,
            count: 1,
            actor: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }
}

/// Destination for audit records. Owned by the caller; implementations decide
/// where entries end up (database, log file, memory).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditRecord);
}

/// Collects audit records in memory. Used by tests and the CLI summary.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditRecord> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditRecord) {
        self.entries.lock().unwrap().push(entry);
    }
}

/// Discards every record
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _entry: AuditRecord) {}
}
