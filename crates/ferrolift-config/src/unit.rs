//! Resolution of configured sections into runnable transfer units

use crate::{
    Config, ConfigError, ConfigResult, DownloaderConfig, ServerIdentity, StreamerConfig,
    SyncMode, SyncerConfig, UnitTuning, UploaderConfig,
};
use ferrolift_types::{Throughput, WorkerCount};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default scan interval for remote to remote units, in seconds
pub const STREAM_SCAN_INTERVAL_SECS: u64 = 60;

/// Default scan interval for every other unit, in seconds
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 1;

/// Configuration section a unit comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitSection {
    /// `downloaders`
    Downloaders,
    /// `uploaders`
    Uploaders,
    /// `streamers`
    Streamers,
    /// `syncers`
    Syncers,
}

impl UnitSection {
    /// Every section, in start order
    pub const ALL: [UnitSection; 4] = [
        UnitSection::Downloaders,
        UnitSection::Uploaders,
        UnitSection::Streamers,
        UnitSection::Syncers,
    ];

    /// Section key in the configuration file
    pub fn key(self) -> &'static str {
        match self {
            Self::Downloaders => "downloaders",
            Self::Uploaders => "uploaders",
            Self::Streamers => "streamers",
            Self::Syncers => "syncers",
        }
    }
}

impl fmt::Display for UnitSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Direction of a sync unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Server is mirrored into the local folder
    ServerToLocal,
    /// Local folder is mirrored onto the server
    LocalToServer,
}

/// What a unit does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Remote to local, source removed after transfer
    Download,
    /// Local to remote, source removed after transfer
    Upload,
    /// Remote to remote, source removed after transfer
    Stream,
    /// Mirror in one direction, source kept
    Sync(SyncDirection),
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => f.write_str("download"),
            Self::Upload => f.write_str("upload"),
            Self::Stream => f.write_str("stream"),
            Self::Sync(SyncDirection::ServerToLocal) => f.write_str("sync(server)"),
            Self::Sync(SyncDirection::LocalToServer) => f.write_str("sync(local)"),
        }
    }
}

/// One side of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// The local filesystem
    Local,
    /// A remote server
    Remote(ServerIdentity),
}

impl Endpoint {
    /// Short label for logs
    pub fn label(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::Remote(server) => &server.name,
        }
    }

    /// Whether this endpoint is a remote server
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Immutable settings of one enabled transfer unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitConfig {
    /// Unit name
    pub name: String,
    /// What the unit does
    pub kind: UnitKind,
    /// Where files are scanned and read
    pub source: Endpoint,
    /// Where files are written
    pub target: Endpoint,
    /// Source directory
    pub source_path: PathBuf,
    /// Destination directory
    pub target_path: PathBuf,
    /// Number of workers
    pub workers: WorkerCount,
    /// Declared throughput
    pub throughput: Throughput,
    /// Ceiling for per-file deadlines
    pub max_timeout: Duration,
    /// Base interval between scan passes
    pub scan_interval: Duration,
    /// Copy source modification times onto destinations
    pub preserve_mtime: bool,
    /// Local folder downloads are staged in
    pub staging_dir: PathBuf,
}

impl Config {
    /// Resolve every enabled unit of one section
    pub fn units(&self, section: UnitSection) -> ConfigResult<Vec<UnitConfig>> {
        let staging = self.general.staging_dir();
        let mut seen = HashSet::new();
        let mut units = Vec::new();

        let mut push = |name: &str, unit: ConfigResult<UnitConfig>| -> ConfigResult<()> {
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::Duplicate {
                    scope: "unit",
                    name: name.to_string(),
                });
            }
            units.push(unit?);
            Ok(())
        };

        match section {
            UnitSection::Downloaders => {
                for unit in self.downloaders.iter().filter(|u| u.enabled) {
                    push(&unit.name, self.resolve_downloader(unit, &staging))?;
                }
            }
            UnitSection::Uploaders => {
                for unit in self.uploaders.iter().filter(|u| u.enabled) {
                    push(&unit.name, self.resolve_uploader(unit, &staging))?;
                }
            }
            UnitSection::Streamers => {
                for unit in self.streamers.iter().filter(|u| u.enabled) {
                    push(&unit.name, self.resolve_streamer(unit, &staging))?;
                }
            }
            UnitSection::Syncers => {
                for unit in self.syncers.iter().filter(|u| u.enabled) {
                    push(&unit.name, self.resolve_syncer(unit, &staging))?;
                }
            }
        }

        Ok(units)
    }

    /// Resolve every enabled unit of every section
    pub fn all_units(&self) -> ConfigResult<Vec<UnitConfig>> {
        let mut units = Vec::new();
        for section in UnitSection::ALL {
            units.extend(self.units(section)?);
        }
        Ok(units)
    }

    fn remote(&self, unit: &str, key: &'static str, server: &str) -> ConfigResult<Endpoint> {
        let identity = self.server(server).ok_or_else(|| ConfigError::UnknownServer {
            unit: unit.to_string(),
            key,
            server: server.to_string(),
        })?;
        if identity.credentials().is_none() {
            return Err(ConfigError::NoCredentials {
                server: identity.name.clone(),
            });
        }
        Ok(Endpoint::Remote(identity.clone()))
    }

    fn resolve_downloader(
        &self,
        unit: &DownloaderConfig,
        staging: &Path,
    ) -> ConfigResult<UnitConfig> {
        let source = self.remote(&unit.name, "source", &unit.source)?;
        build_unit(
            &unit.name,
            UnitKind::Download,
            (source, Endpoint::Local),
            (unit.source_path.as_path(), unit.target_path.as_path()),
            &unit.tuning,
            staging,
        )
    }

    fn resolve_uploader(&self, unit: &UploaderConfig, staging: &Path) -> ConfigResult<UnitConfig> {
        let target = self.remote(&unit.name, "target", &unit.target)?;
        build_unit(
            &unit.name,
            UnitKind::Upload,
            (Endpoint::Local, target),
            (unit.source_path.as_path(), unit.target_path.as_path()),
            &unit.tuning,
            staging,
        )
    }

    fn resolve_streamer(&self, unit: &StreamerConfig, staging: &Path) -> ConfigResult<UnitConfig> {
        let source = self.remote(&unit.name, "source", &unit.source)?;
        let target = self.remote(&unit.name, "target", &unit.target)?;
        build_unit(
            &unit.name,
            UnitKind::Stream,
            (source, target),
            (unit.source_path.as_path(), unit.target_path.as_path()),
            &unit.tuning,
            staging,
        )
    }

    fn resolve_syncer(&self, unit: &SyncerConfig, staging: &Path) -> ConfigResult<UnitConfig> {
        let server = self.remote(&unit.name, "server", &unit.server)?;
        let (kind, endpoints, paths) = match unit.mode {
            SyncMode::Server => (
                UnitKind::Sync(SyncDirection::ServerToLocal),
                (server, Endpoint::Local),
                (unit.server_path.as_path(), unit.local_path.as_path()),
            ),
            SyncMode::Local => (
                UnitKind::Sync(SyncDirection::LocalToServer),
                (Endpoint::Local, server),
                (unit.local_path.as_path(), unit.server_path.as_path()),
            ),
            SyncMode::Twoway => {
                return Err(ConfigError::TwowayUnsupported {
                    unit: unit.name.clone(),
                })
            }
        };
        let mut resolved = build_unit(&unit.name, kind, endpoints, paths, &unit.tuning, staging)?;
        resolved.preserve_mtime = true;
        Ok(resolved)
    }
}

fn build_unit(
    name: &str,
    kind: UnitKind,
    (source, target): (Endpoint, Endpoint),
    (source_path, target_path): (&Path, &Path),
    tuning: &UnitTuning,
    staging: &Path,
) -> ConfigResult<UnitConfig> {
    if name.trim().is_empty() {
        return Err(ConfigError::Missing {
            key: "unit name".to_string(),
        });
    }
    if source_path.as_os_str().is_empty() || target_path.as_os_str().is_empty() {
        return Err(ConfigError::Missing {
            key: format!("{}: source and target paths", name),
        });
    }
    let workers = WorkerCount::new(tuning.worker)
        .map_err(|e| ConfigError::out_of_range(name, "worker", e))?;
    let throughput = Throughput::new(tuning.throughput)
        .map_err(|e| ConfigError::out_of_range(name, "throughput", e))?;
    if tuning.max_timeout == 0 {
        return Err(ConfigError::out_of_range(
            name,
            "max_timeout",
            "must be at least 1 second",
        ));
    }
    let default_interval = match kind {
        UnitKind::Stream => STREAM_SCAN_INTERVAL_SECS,
        _ => DEFAULT_SCAN_INTERVAL_SECS,
    };
    let scan_interval = tuning.scan_interval.unwrap_or(default_interval).max(1);

    Ok(UnitConfig {
        name: name.to_string(),
        kind,
        source,
        target,
        source_path: source_path.to_path_buf(),
        target_path: target_path.to_path_buf(),
        workers,
        throughput,
        max_timeout: Duration::from_secs(tuning.max_timeout),
        scan_interval: Duration::from_secs(scan_interval),
        preserve_mtime: tuning.preserve_mtime,
        staging_dir: staging.to_path_buf(),
    })
}
