//! The filesystem contract shared by local folders and remote sessions

use ferrolift_types::{DirEntry, Error, FileStat, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Blocking file access on one side of a transfer.
///
/// Implementations own their session. Every call may block on the network, so
/// async callers go through [`run_blocking`].
pub trait FileSystem: Send + Sync {
    /// Short name used in logs
    fn label(&self) -> &str;

    /// List the direct children of a directory
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Stat a path, `None` when it does not exist
    fn stat(&self, path: &Path) -> Result<Option<FileStat>>;

    /// Open a file for reading
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Create or truncate a file for writing
    fn create_write(&self, path: &Path) -> Result<Box<dyn Write + Send>>;

    /// Remove a file
    fn remove(&self, path: &Path) -> Result<()>;

    /// Create a directory and all missing parents
    fn mkdir_all(&self, path: &Path) -> Result<()>;

    /// Set the modification time of a file
    fn set_mtime(&self, path: &Path, modified: SystemTime) -> Result<()>;

    /// Rename a file, replacing the destination
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Join a relative path onto a base directory on this side
    fn join(&self, base: &Path, relative: &Path) -> PathBuf {
        base.join(relative)
    }

    /// Check that the underlying session still answers
    fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Release the session
    fn close(&self) {}
}

/// Run a blocking filesystem call on the blocking thread pool
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::other(format!("blocking task failed: {}", e)))?
}

/// Path of `path` relative to `root`, or `None` when it lies outside it
pub fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}
