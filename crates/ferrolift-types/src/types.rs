//! Core data types for ferrolift
//!
//! This module provides the values that flow through the transfer pipeline:
//! file snapshots taken at scan time, directory entries returned by a
//! filesystem, and per-unit transfer statistics.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// File size in bytes
pub type FileSize = u64;

/// Transfer rate in bytes per second
pub type TransferRate = f64;

/// Size and modification time of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileStat {
    /// Size in bytes
    pub size: FileSize,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileStat {
    /// Create a new stat snapshot
    pub fn new(size: FileSize, modified: SystemTime) -> Self {
        Self { size, modified }
    }

    /// Create a stat snapshot from a Unix timestamp in seconds
    pub fn from_unix_secs(size: FileSize, secs: u64) -> Self {
        Self {
            size,
            modified: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    /// Modification time truncated to whole seconds since the Unix epoch
    pub fn mtime_secs(&self) -> i64 {
        match self.modified.duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_secs() as i64,
            Err(before) => -(before.duration().as_secs() as i64),
        }
    }
}

/// A file discovered by a scan pass.
///
/// The snapshot is taken once at scan time and handed to exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileObj {
    /// Full path on the source side
    pub path: PathBuf,
    /// Stat captured while scanning
    pub stat: FileStat,
}

impl FileObj {
    /// Create a new file object
    pub fn new(path: impl Into<PathBuf>, stat: FileStat) -> Self {
        Self {
            path: path.into(),
            stat,
        }
    }

    /// File size in bytes
    pub fn size(&self) -> FileSize {
        self.stat.size
    }
}

/// One entry returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Full path of the entry
    pub path: PathBuf,
    /// Stat of the entry
    pub stat: FileStat,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// Transfer statistics for one unit
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransferStats {
    /// Number of files transferred
    pub files_transferred: u64,
    /// Total bytes transferred
    pub bytes_transferred: u64,
    /// Number of files skipped because the destination was already current
    pub files_skipped: u64,
    /// Number of failed transfers
    pub files_failed: u64,
    /// Number of source files removed after transfer
    pub sources_removed: u64,
    /// Total time spent moving data
    pub duration: Duration,
}

impl TransferStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate the overall transfer rate
    pub fn transfer_rate(&self) -> TransferRate {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes_transferred as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Merge statistics from another instance
    pub fn merge(&mut self, other: &TransferStats) {
        self.files_transferred += other.files_transferred;
        self.bytes_transferred += other.bytes_transferred;
        self.files_skipped += other.files_skipped;
        self.files_failed += other.files_failed;
        self.sources_removed += other.sources_removed;
        self.duration += other.duration;
    }
}

/// Throughput in megabits per second for `bytes` moved in `elapsed`
pub fn megabits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 * 8.0) / secs / 1_000_000.0
    } else {
        0.0
    }
}
