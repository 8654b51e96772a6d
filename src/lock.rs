// Locked-file detection
// Best-effort probing for files held open by another process. Only used to
// produce nicer error messages; correctness never depends on it.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

/// Result of probing a file for locks
#[derive(Debug, Clone)]
pub struct LockStatus {
    pub locked: bool,
    /// Description of the process holding the file, when discoverable
    pub owner: Option<String>,
}

impl LockStatus {
    pub fn free() -> Self {
        Self { locked: false, owner: None }
    }

    pub fn locked_by_unknown() -> Self {
        Self { locked: true, owner: None }
    }
}

/// Capability interface for identifying who holds a file open.
/// Platform-specific implementations may name the blocking process; the
/// default reports the owner as unknown.
pub trait LockOwnerProbe: Send + Sync {
    fn probe(&self, path: &Path) -> LockStatus;
}

/// Default probe: attempt an exclusive write open. On platforms with
/// mandatory sharing semantics this detects open handles; elsewhere it is a
/// plain writability check. The owner is always reported as unknown.
pub struct ExclusiveOpenProbe;

impl LockOwnerProbe for ExclusiveOpenProbe {
    fn probe(&self, path: &Path) -> LockStatus {
        match OpenOptions::new().write(true).open(path) {
            Ok(_) => LockStatus::free(),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => LockStatus::locked_by_unknown(),
            // NotFound and other errors are not lock conditions; the caller's
            // own filesystem operation will surface them with context
            Err(_) => LockStatus::free(),
        }
    }
}
