//! Configuration management system for ferrolift
//!
//! This crate loads the servers and transfer units ferrolift runs, from a YAML
//! file layered over built-in defaults and environment overrides, and resolves
//! the enabled units into immutable [`UnitConfig`] values for the engine.
//!
//! # Features
//!
//! - **YAML file**: `config.yaml` next to the executable, or an explicit path
//! - **Validation**: server references, worker counts, throughput and sync modes
//! - **Environment overrides**: `FERROLIFT__SECTION__KEY=value`
//! - **Defaults**: every tuning option has a built-in value the file may override
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrolift_config::{ConfigBuilder, UnitSection};
//!
//! let config = ConfigBuilder::new()
//!     .add_source_file("config.yaml")
//!     .add_env_prefix("FERROLIFT")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! let downloaders = config.units(UnitSection::Downloaders).unwrap();
//! println!("{} downloaders enabled", downloaders.len());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod builder;
pub mod error;
pub mod loader;
pub mod server;
pub mod unit;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use server::{Credentials, ServerIdentity};
pub use unit::{Endpoint, SyncDirection, UnitConfig, UnitKind, UnitSection};

/// Main configuration structure for ferrolift
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Settings shared by every unit
    #[serde(default)]
    pub general: GeneralConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Remote servers
    #[serde(default)]
    pub servers: Vec<ServerIdentity>,
    /// Remote to local units
    #[serde(default)]
    pub downloaders: Vec<DownloaderConfig>,
    /// Local to remote units
    #[serde(default)]
    pub uploaders: Vec<UploaderConfig>,
    /// Remote to remote units
    #[serde(default)]
    pub streamers: Vec<StreamerConfig>,
    /// Mirroring units
    #[serde(default)]
    pub syncers: Vec<SyncerConfig>,
}

impl Config {
    /// Look up a server by name
    pub fn server(&self, name: &str) -> Option<&ServerIdentity> {
        self.servers.iter().find(|server| server.name == name)
    }
}

/// Settings shared by every unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Staging folder for downloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_folder: Option<PathBuf>,
}

impl GeneralConfig {
    /// Staging folder, falling back to the OS temp directory
    pub fn staging_dir(&self) -> PathBuf {
        self.temp_folder
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `FERROLIFT_LOG_LEVEL` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable file logging
    #[serde(default = "default_true")]
    pub enable_file_logging: bool,
    /// Log file path, relative paths resolve next to the executable
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Enable JSON formatting for the file sink
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            enable_file_logging: true,
            log_file: default_log_file(),
            json_format: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("ferrolift.log")
}

fn default_true() -> bool {
    true
}

fn default_worker() -> usize {
    1
}

fn default_throughput() -> u64 {
    ferrolift_types::Throughput::DEFAULT
}

fn default_max_timeout() -> u64 {
    600
}

/// Tuning knobs every unit carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTuning {
    /// Number of workers
    #[serde(default = "default_worker")]
    pub worker: usize,
    /// Declared throughput in Mbps, used to derive per-file deadlines
    #[serde(default = "default_throughput")]
    pub throughput: u64,
    /// Ceiling for per-file deadlines in seconds
    #[serde(default = "default_max_timeout")]
    pub max_timeout: u64,
    /// Base interval between scan passes in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<u64>,
    /// Copy the source modification time onto the destination
    #[serde(default = "default_true")]
    pub preserve_mtime: bool,
}

impl Default for UnitTuning {
    fn default() -> Self {
        Self {
            worker: default_worker(),
            throughput: default_throughput(),
            max_timeout: default_max_timeout(),
            scan_interval: None,
            preserve_mtime: true,
        }
    }
}

/// Remote to local unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Unit name
    pub name: String,
    /// Whether the unit runs
    #[serde(default)]
    pub enabled: bool,
    /// Source server name
    pub source: String,
    /// Remote directory to drain
    pub source_path: PathBuf,
    /// Local destination directory
    pub target_path: PathBuf,
    /// Tuning knobs
    #[serde(flatten)]
    pub tuning: UnitTuning,
}

/// Local to remote unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Unit name
    pub name: String,
    /// Whether the unit runs
    #[serde(default)]
    pub enabled: bool,
    /// Target server name
    pub target: String,
    /// Local directory to drain
    pub source_path: PathBuf,
    /// Remote destination directory
    pub target_path: PathBuf,
    /// Tuning knobs
    #[serde(flatten)]
    pub tuning: UnitTuning,
}

/// Remote to remote unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Unit name
    pub name: String,
    /// Whether the unit runs
    #[serde(default)]
    pub enabled: bool,
    /// Source server name
    pub source: String,
    /// Target server name
    pub target: String,
    /// Remote directory to drain
    pub source_path: PathBuf,
    /// Remote destination directory
    pub target_path: PathBuf,
    /// Tuning knobs
    #[serde(flatten)]
    pub tuning: UnitTuning,
}

/// Mirroring unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncerConfig {
    /// Unit name
    pub name: String,
    /// Whether the unit runs
    #[serde(default)]
    pub enabled: bool,
    /// Server name
    pub server: String,
    /// Which side is authoritative
    #[serde(default)]
    pub mode: SyncMode,
    /// Local directory
    pub local_path: PathBuf,
    /// Remote directory
    pub server_path: PathBuf,
    /// Tuning knobs
    #[serde(flatten)]
    pub tuning: UnitTuning,
}

/// Sync mode as written in the configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncMode {
    /// Server is the source, local folder mirrors it
    #[default]
    Server,
    /// Local folder is the source, server mirrors it
    Local,
    /// Bidirectional mirroring, rejected by validation
    Twoway,
}

impl From<String> for SyncMode {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "twoway" => Self::Twoway,
            _ => Self::Server,
        }
    }
}

impl From<SyncMode> for String {
    fn from(mode: SyncMode) -> Self {
        match mode {
            SyncMode::Server => "server",
            SyncMode::Local => "local",
            SyncMode::Twoway => "twoway",
        }
        .to_string()
    }
}
