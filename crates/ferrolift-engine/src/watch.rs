//! Stability tracking for local sync sources
//!
//! A file being written locally must not be pushed half-finished. The watch
//! map records the modification time each file had when it was last seen and
//! only lets a file through on the first pass it appears or once it changes.

use ferrolift_types::FileStat;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct WatchEntry {
    last_seen_pass: u64,
    mtime_secs: i64,
}

/// Last-seen modification times per path
#[derive(Debug, Default)]
pub struct WatchMap {
    entries: HashMap<PathBuf, WatchEntry>,
    pass: u64,
}

impl WatchMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new scan pass
    pub fn begin_pass(&mut self) -> u64 {
        self.pass += 1;
        self.pass
    }

    /// Record a sighting and return whether the file should be dispatched.
    ///
    /// A new path is dispatched; a known path only when its modification time
    /// changed since the previous sighting.
    pub fn observe(&mut self, path: &Path, stat: &FileStat) -> bool {
        let mtime_secs = stat.mtime_secs();
        let pass = self.pass;
        match self.entries.get_mut(path) {
            Some(entry) => {
                entry.last_seen_pass = pass;
                if entry.mtime_secs == mtime_secs {
                    false
                } else {
                    entry.mtime_secs = mtime_secs;
                    true
                }
            }
            None => {
                self.entries.insert(
                    path.to_path_buf(),
                    WatchEntry {
                        last_seen_pass: pass,
                        mtime_secs,
                    },
                );
                true
            }
        }
    }

    /// Drop every path not seen during the current pass, returning how many
    pub fn end_pass(&mut self) -> usize {
        let pass = self.pass;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_seen_pass == pass);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Evicted {} vanished paths from the watch map", evicted);
        }
        evicted
    }

    /// Number of tracked paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no path is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `path` is tracked
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }
}
