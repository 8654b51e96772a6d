//! Progress reporting for long-running reconciliation jobs.
//!
//! One throttling policy object serves every scan/compare phase, and every
//! emitted snapshot satisfies `scanned == equals + needs_sync`.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Emit at least this often while items are flowing
pub const EMIT_MIN_INTERVAL: Duration = Duration::from_secs(1);
/// ... or after this many processed items, whichever comes first
pub const EMIT_EVERY_ITEMS: usize = 10;

/// Phase of a reconciliation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// No job data yet
    Idle,
    Starting,
    ScanA,
    ScanB,
    Compare,
    Complete,
    Cancelled,
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::ScanA => "scanning folder A",
            Self::ScanB => "scanning folder B",
            Self::Compare => "comparing",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot of a running reconciliation.
///
/// `scanned` is always `equals + needs_sync` and never decreases within a
/// job, so a caller can render a stable percentage bar from it. `indexed`
/// carries per-file activity during the scan phases, where records have not
/// been classified yet.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,
    pub current_file: String,
    /// Records classified so far (equals + needs_sync)
    pub scanned: usize,
    /// Matched same-name same-hash pairs
    pub equals: usize,
    /// Records that need a copy or a policy decision
    pub needs_sync: usize,
    /// Files indexed during the scan phases
    pub indexed: usize,
}

impl ProgressSnapshot {
    /// The snapshot reported for unknown job ids: no data yet, not an error
    pub fn idle() -> Self {
        Self {
            phase: ProgressPhase::Idle,
            current_file: String::new(),
            scanned: 0,
            equals: 0,
            needs_sync: 0,
            indexed: 0,
        }
    }
}

/// Type alias for the reconciliation progress callback
pub type ProgressCallback = Box<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Shared cancellation flag, checked cooperatively at progress checkpoints
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Throttling policy for progress emission: a callback must not run on every
/// file, so `tick` approves an emission only after `min_items` items or
/// `min_interval` elapsed time, whichever comes first. Phase transitions
/// bypass the throttle via `reset` + an unconditional emit by the caller.
pub struct ProgressThrottle {
    min_interval: Duration,
    min_items: usize,
    last_emit: Instant,
    items_since_emit: usize,
}

impl ProgressThrottle {
    pub fn new() -> Self {
        Self::with_limits(EMIT_MIN_INTERVAL, EMIT_EVERY_ITEMS)
    }

    pub fn with_limits(min_interval: Duration, min_items: usize) -> Self {
        Self {
            min_interval,
            min_items,
            last_emit: Instant::now(),
            items_since_emit: 0,
        }
    }

    /// Record one processed item; returns true when an emission is due
    pub fn tick(&mut self) -> bool {
        self.items_since_emit += 1;
        if self.items_since_emit >= self.min_items || self.last_emit.elapsed() >= self.min_interval {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Mark an emission as done (used around forced phase-transition emits)
    pub fn reset(&mut self) {
        self.last_emit = Instant::now();
        self.items_since_emit = 0;
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new()
    }
}
