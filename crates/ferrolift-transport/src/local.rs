//! Local filesystem access

use crate::fs::FileSystem;
use ferrolift_types::{DirEntry, Error, FileStat, Result};
use filetime::FileTime;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Clone)]
pub struct LocalFs {
    label: String,
}

impl LocalFs {
    /// Create a local filesystem labelled `local`
    pub fn new() -> Self {
        Self::named("local")
    }

    /// Create a local filesystem with a custom log label
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for LocalFs {
    fn default() -> Self {
        Self::new()
    }
}

fn stat_of(metadata: &fs::Metadata) -> FileStat {
    FileStat::new(
        metadata.len(),
        metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    )
}

impl FileSystem for LocalFs {
    fn label(&self) -> &str {
        &self.label
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let entries = fs::read_dir(path).map_err(|e| Error::scan(path, e.to_string()))?;
        let mut listing = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {}", path.display(), e);
                    continue;
                }
            };
            let entry_path = entry.path();
            match fs::metadata(&entry_path) {
                Ok(metadata) => listing.push(DirEntry {
                    stat: stat_of(&metadata),
                    is_dir: metadata.is_dir(),
                    path: entry_path,
                }),
                Err(e) => debug!("Skipping {}: {}", entry_path.display(), e),
            }
        }
        Ok(listing)
    }

    fn stat(&self, path: &Path) -> Result<Option<FileStat>> {
        match fs::metadata(path) {
            Ok(metadata) => Ok(Some(stat_of(&metadata))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from_io(&e, path)),
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path).map_err(|e| Error::from_io(&e, path))?;
        Ok(Box::new(file))
    }

    fn create_write(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        let file = fs::File::create(path).map_err(|e| Error::from_io(&e, path))?;
        Ok(Box::new(file))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| Error::from_io(&e, path))
    }

    fn mkdir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| Error::from_io(&e, path))
    }

    fn set_mtime(&self, path: &Path, modified: SystemTime) -> Result<()> {
        filetime::set_file_mtime(path, FileTime::from_system_time(modified))
            .map_err(|e| Error::from_io(&e, path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| Error::rename(from, to, e.to_string()))
    }
}
