//! Per-unit counters

use ferrolift_config::UnitKind;
use ferrolift_types::TransferStats;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by the workers of one unit
#[derive(Debug, Default)]
pub struct UnitStats {
    transferred: AtomicU64,
    bytes: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    removed: AtomicU64,
    busy_micros: AtomicU64,
}

impl UnitStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed transfer
    pub fn record_transfer(&self, bytes: u64, elapsed: Duration) {
        self.transferred.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.busy_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Record a file skipped because its destination was current
    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed transfer
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a source removed after transfer
    pub fn record_removal(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> TransferStats {
        TransferStats {
            files_transferred: self.transferred.load(Ordering::Relaxed),
            bytes_transferred: self.bytes.load(Ordering::Relaxed),
            files_skipped: self.skipped.load(Ordering::Relaxed),
            files_failed: self.failed.load(Ordering::Relaxed),
            sources_removed: self.removed.load(Ordering::Relaxed),
            duration: Duration::from_micros(self.busy_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Summary of one unit's run
#[derive(Debug, Clone)]
pub struct UnitReport {
    /// Unit name
    pub unit: String,
    /// What the unit does
    pub kind: UnitKind,
    /// Files dispatched by the scanner
    pub files_found: u64,
    /// Transfer counters
    pub stats: TransferStats,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl UnitReport {
    /// Whether any file failed
    pub fn has_failures(&self) -> bool {
        self.stats.files_failed > 0
    }
}
