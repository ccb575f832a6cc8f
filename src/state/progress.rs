use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Point-in-time view of a crawler's progress counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Units discovered so far
    pub max: u64,
    /// Units completed so far
    pub actual: u64,
    /// Errors encountered so far
    pub errors: u64,
}

impl ProgressSnapshot {
    /// Completed share in percent, 0 when nothing was discovered yet
    pub fn percent(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            (self.actual as f64 / self.max as f64 * 100.0).min(100.0)
        }
    }
}

/// Per-crawler progress counters
///
/// All counters only grow during a run. They are plain atomics, so workers
/// bump them and listeners read them without blocking each other.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    max: AtomicU64,
    actual: AtomicU64,
    errors: AtomicU64,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_max(&self, delta: u64) {
        self.max.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn increment_actual(&self) {
        self.actual.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            max: self.max.load(Ordering::Relaxed),
            actual: self.actual.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Shape of the task trees a crawler ran
#[derive(Debug, Default)]
pub struct TaskStats {
    forks: AtomicU64,
    max_depth: AtomicU32,
    lost_branches: AtomicU64,
}

impl TaskStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a task split its queue and forked a sibling
    pub fn record_fork(&self) {
        self.forks.fetch_add(1, Ordering::Relaxed);
    }

    /// Records that a task ran at `depth` below its root
    pub fn record_depth(&self, depth: u32) {
        self.max_depth.fetch_max(depth, Ordering::Relaxed);
    }

    /// Records a forked sibling whose result never arrived
    pub fn record_lost_branch(&self) {
        self.lost_branches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forks(&self) -> u64 {
        self.forks.load(Ordering::Relaxed)
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth.load(Ordering::Relaxed)
    }

    pub fn lost_branches(&self) -> u64 {
        self.lost_branches.load(Ordering::Relaxed)
    }
}
