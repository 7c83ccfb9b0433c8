//! Unified test utilities for ferrolift integration tests

use ferrolift_config::{Config, ConfigLoader, UnitConfig, UnitSection};
use ferrolift_engine::PipelineOptions;
use ferrolift_transport::{FileSystem, LocalFs};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros
    Zeros,
    /// Structured bytes that differ per offset
    Realistic,
}

/// Generate test data with specified pattern
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Realistic => (0..size).map(|i| ((i * 7 + 13) % 256) as u8).collect(),
    }
}

/// Write `files` (relative path, size) under `root`, creating parents
pub fn write_tree(root: &Path, files: &[(&str, usize)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(relative, size)| {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create fixture directory");
            }
            fs::write(&path, generate_test_data(*size, TestDataPattern::Realistic))
                .expect("write fixture file");
            path
        })
        .collect()
}

/// Snapshot of every regular file under `root`: relative path to contents
pub fn tree_contents(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    if !root.exists() {
        return BTreeMap::new();
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("walkdir stays under its root")
                .to_path_buf();
            let contents = fs::read(entry.path()).expect("read tree file");
            (relative, contents)
        })
        .collect()
}

/// Give every file under `root` a distinct whole-second modification time
/// starting at `base_secs`, returning relative path to seconds
pub fn stamp_mtimes(root: &Path, base_secs: u64) -> BTreeMap<PathBuf, i64> {
    let local = LocalFs::new();
    tree_contents(root)
        .into_keys()
        .enumerate()
        .map(|(i, relative)| {
            let secs = base_secs + 60 * i as u64;
            local
                .set_mtime(&root.join(&relative), UNIX_EPOCH + Duration::from_secs(secs))
                .expect("stamp fixture mtime");
            (relative, secs as i64)
        })
        .collect()
}

/// Whole-second modification time of every file under `root`
pub fn tree_mtimes(root: &Path) -> BTreeMap<PathBuf, i64> {
    let local = LocalFs::new();
    tree_contents(root)
        .into_keys()
        .map(|relative| {
            let stat = local
                .stat(&root.join(&relative))
                .expect("stat tree file")
                .expect("tree file exists");
            (relative, stat.mtime_secs())
        })
        .collect()
}

/// Number of regular files under `root`
pub fn file_count(root: &Path) -> usize {
    tree_contents(root).len()
}

/// A scratch workspace with the folders every scenario needs
pub struct Workspace {
    /// Owns the temporary directory
    pub dir: TempDir,
}

impl Workspace {
    /// Create a workspace with `remote`, `local` and `staging` folders
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        for folder in ["remote", "local", "staging", "mirror"] {
            fs::create_dir_all(dir.path().join(folder)).expect("create workspace folder");
        }
        Self { dir }
    }

    /// Path of a folder inside the workspace
    pub fn path(&self, folder: &str) -> PathBuf {
        self.dir.path().join(folder)
    }

    /// YAML preamble with the staging folder and two loopback servers
    pub fn preamble(&self) -> String {
        format!(
            "general:\n  temp_folder: '{}'\nlogging:\n  enable_file_logging: false\nservers:\n  - {{ name: edge, host: localhost, user: lift, password: secret }}\n  - {{ name: core, ip: 127.0.0.1, user: lift, password: secret }}\n",
            self.path("staging").display()
        )
    }

    /// Write `body` after the preamble to `config.yaml` and load it
    pub fn load_config(&self, body: &str) -> Config {
        let path = self.dir.path().join("config.yaml");
        fs::write(&path, format!("{}{}", self.preamble(), body)).expect("write config");
        ConfigLoader::load_from_file(&path).expect("load config")
    }

    /// Load a configuration and resolve one section
    pub fn units(&self, body: &str, section: UnitSection) -> Vec<UnitConfig> {
        self.load_config(body)
            .units(section)
            .expect("resolve units")
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline options with short delays for tests
pub fn fast_options() -> PipelineOptions {
    PipelineOptions::fast()
}

/// Shorten the scan interval of every unit
pub fn with_scan_interval(mut units: Vec<UnitConfig>, interval: Duration) -> Vec<UnitConfig> {
    for unit in &mut units {
        unit.scan_interval = interval;
    }
    units
}
