//! Moving one file from source to destination
//!
//! The byte copy runs on the blocking pool. The async side races it against
//! the per-file deadline and the stop token; when either fires, the copy is
//! told to abort through a [`CopyGuard`] that it checks between chunks.

use crate::context::RunContext;
use crate::options::PipelineOptions;
use crate::plan::TransferShape;
use chrono::Utc;
use ferrolift_config::UnitConfig;
use ferrolift_transport::FileSystem;
use ferrolift_types::{megabits_per_second, Error, FileStat, Result, Throughput};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Floor of every per-file deadline below the ceiling
pub const MIN_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for moving `size` bytes at the declared throughput.
///
/// The expected duration is raised to at least one minute while it stays
/// under `max`; otherwise `max` itself is the deadline.
pub fn compute_timeout(throughput: Throughput, size: u64, max: Duration) -> Duration {
    let expected = Duration::from_secs(size / throughput.bytes_per_second());
    if expected < max {
        expected.max(MIN_TRANSFER_TIMEOUT)
    } else {
        max
    }
}

/// Name of a staged temp file: `<prefix>_<millis><index>`
pub fn temp_file_name(prefix: &str, millis: i64, index: u32) -> String {
    format!("{}_{}{}", prefix, millis, index)
}

/// Abort signal and deadline checked by a running copy
#[derive(Debug, Clone)]
pub struct CopyGuard {
    token: CancellationToken,
    deadline: Instant,
    timeout: Duration,
}

impl CopyGuard {
    /// Guard that expires `timeout` from now or when `token` is cancelled
    pub fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Fail with `Timeout` past the deadline or `Cancelled` once aborted
    pub fn check(&self) -> Result<()> {
        if Instant::now() >= self.deadline {
            return Err(Error::Timeout {
                seconds: self.timeout.as_secs(),
            });
        }
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Copy `reader` into `writer` in chunks, checking `guard` between chunks
pub fn copy_with_guard(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    guard: &CopyGuard,
    chunk_size: usize,
    path: &Path,
) -> Result<u64> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        guard.check()?;
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::transfer(path, format!("read failed: {}", e))),
        };
        guard.check()?;
        writer
            .write_all(&buffer[..read])
            .map_err(|e| Error::transfer(path, format!("write failed: {}", e)))?;
        total += read as u64;
    }
    writer
        .flush()
        .map_err(|e| Error::transfer(path, format!("flush failed: {}", e)))?;
    Ok(total)
}

/// Keep connection, abort and transfer errors; wrap the rest as a transfer error
fn in_transfer(error: Error, path: &Path) -> Error {
    match error {
        Error::Connection { .. }
        | Error::Cancelled
        | Error::Timeout { .. }
        | Error::Transfer { .. }
        | Error::Rename { .. } => error,
        other => Error::transfer(path, other.to_string()),
    }
}

/// One file to move
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Path on the source side
    pub source: PathBuf,
    /// Final path on the destination side
    pub destination: PathBuf,
    /// Source stat captured at scan time
    pub stat: FileStat,
}

/// Result of a successful transfer
#[derive(Debug, Clone, Copy)]
pub struct TransferReport {
    /// Bytes written
    pub bytes: u64,
    /// Time the transfer took
    pub elapsed: Duration,
    /// Deadline the transfer ran under
    pub timeout: Duration,
}

impl TransferReport {
    /// Achieved throughput in megabits per second
    pub fn megabits_per_second(&self) -> f64 {
        megabits_per_second(self.bytes, self.elapsed)
    }
}

/// Everything the blocking side needs, moved onto the blocking pool
struct CopyTask {
    source: Arc<dyn FileSystem>,
    target: Arc<dyn FileSystem>,
    job: TransferJob,
    temp: Option<PathBuf>,
    preserve_mtime: bool,
    chunk_size: usize,
    rename_attempts: u32,
    rename_delay: Duration,
    guard: CopyGuard,
}

impl CopyTask {
    fn run(&self) -> Result<u64> {
        match &self.temp {
            Some(temp) => self.staged(temp),
            None => self.direct(),
        }
    }

    fn staged(&self, temp: &Path) -> Result<u64> {
        if let Some(staging) = temp.parent() {
            self.target.mkdir_all(staging)?;
        }
        let bytes = match self.copy_into(temp) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.discard(temp);
                return Err(e);
            }
        };
        self.apply_mtime(temp);
        if let Some(parent) = self.job.destination.parent() {
            if let Err(e) = self.target.mkdir_all(parent) {
                self.discard(temp);
                return Err(in_transfer(e, &self.job.source));
            }
        }
        self.commit(temp)?;
        Ok(bytes)
    }

    fn direct(&self) -> Result<u64> {
        if let Some(parent) = self.job.destination.parent() {
            self.target
                .mkdir_all(parent)
                .map_err(|e| in_transfer(e, &self.job.source))?;
        }
        let bytes = self.copy_into(&self.job.destination)?;
        self.apply_mtime(&self.job.destination);
        Ok(bytes)
    }

    fn copy_into(&self, path: &Path) -> Result<u64> {
        let source_path = &self.job.source;
        let mut reader = self
            .source
            .open_read(source_path)
            .map_err(|e| in_transfer(e, source_path))?;
        let mut writer = self
            .target
            .create_write(path)
            .map_err(|e| in_transfer(e, source_path))?;
        let bytes = copy_with_guard(
            &mut *reader,
            &mut *writer,
            &self.guard,
            self.chunk_size,
            source_path,
        )?;
        drop(writer);
        Ok(bytes)
    }

    fn apply_mtime(&self, path: &Path) {
        if !self.preserve_mtime {
            return;
        }
        if let Err(e) = self.target.set_mtime(path, self.job.stat.modified) {
            warn!("Cannot set modification time of {}: {}", path.display(), e);
        }
    }

    fn commit(&self, temp: &Path) -> Result<()> {
        let destination = &self.job.destination;
        let attempts = self.rename_attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match self.target.rename(temp, destination) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Rename {} -> {} failed (attempt {}/{}): {}",
                        temp.display(),
                        destination.display(),
                        attempt,
                        attempts,
                        e
                    );
                    last = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(self.rename_delay);
                    }
                }
            }
        }
        self.discard(temp);
        Err(match last {
            Some(e @ (Error::Rename { .. } | Error::Connection { .. })) => e,
            Some(e) => Error::rename(temp, destination, e.to_string()),
            None => Error::rename(temp, destination, "no attempt made"),
        })
    }

    fn discard(&self, temp: &Path) {
        match self.target.remove(temp) {
            Ok(()) | Err(Error::NotFound { .. }) => {}
            Err(e) => warn!("Cannot remove temp file {}: {}", temp.display(), e),
        }
    }
}

/// Moves files for one worker
pub struct TransferExecutor {
    source: Arc<dyn FileSystem>,
    target: Arc<dyn FileSystem>,
    ctx: Arc<RunContext>,
    shape: TransferShape,
    staging_dir: PathBuf,
    prefix: String,
    throughput: Throughput,
    max_timeout: Duration,
    preserve_mtime: bool,
    options: PipelineOptions,
}

impl std::fmt::Debug for TransferExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferExecutor")
            .field("source", &self.source.label())
            .field("target", &self.target.label())
            .field("shape", &self.shape)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl TransferExecutor {
    /// Create an executor moving files of `unit` between two open filesystems.
    ///
    /// `prefix` names staged temp files and must be unique per worker.
    pub fn new(
        unit: &UnitConfig,
        shape: TransferShape,
        source: Arc<dyn FileSystem>,
        target: Arc<dyn FileSystem>,
        ctx: Arc<RunContext>,
        prefix: impl Into<String>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source,
            target,
            ctx,
            shape,
            staging_dir: unit.staging_dir.clone(),
            prefix: prefix.into(),
            throughput: unit.throughput,
            max_timeout: unit.max_timeout,
            preserve_mtime: unit.preserve_mtime,
            options,
        }
    }

    /// Move one file, giving up at its deadline or when `stop` fires.
    ///
    /// A staged transfer never leaves a partial file at the destination. A copy
    /// that does not wind down within the cleanup grace is reported as a
    /// connection error so the worker drops its sessions.
    pub async fn execute(&self, job: TransferJob, stop: &CancellationToken) -> Result<TransferReport> {
        let timeout = compute_timeout(self.throughput, job.stat.size, self.max_timeout);
        let abort = stop.child_token();
        let temp = match self.shape {
            TransferShape::Staged => Some(self.staging_dir.join(temp_file_name(
                &self.prefix,
                Utc::now().timestamp_millis(),
                self.ctx.next_temp_index(),
            ))),
            TransferShape::Direct => None,
        };
        debug!(
            "Transferring {} -> {} with a {:?} deadline",
            job.source.display(),
            job.destination.display(),
            timeout
        );

        let source_path = job.source.clone();
        let task = CopyTask {
            source: Arc::clone(&self.source),
            target: Arc::clone(&self.target),
            job,
            temp,
            preserve_mtime: self.preserve_mtime,
            chunk_size: self.options.chunk_size,
            rename_attempts: self.options.rename_attempts,
            rename_delay: self.options.rename_delay,
            guard: CopyGuard::new(abort.clone(), timeout),
        };

        let started = Instant::now();
        let mut handle = tokio::task::spawn_blocking(move || task.run());
        let reason = tokio::select! {
            joined = &mut handle => {
                let bytes = joined.map_err(|e| Error::other(format!("copy task failed: {}", e)))??;
                return Ok(TransferReport { bytes, elapsed: started.elapsed(), timeout });
            }
            () = tokio::time::sleep(timeout) => Error::Timeout { seconds: timeout.as_secs() },
            () = stop.cancelled() => Error::Cancelled,
        };

        abort.cancel();
        match tokio::time::timeout(self.options.cleanup_grace, handle).await {
            Ok(Ok(Ok(bytes))) => {
                debug!("{} completed while being aborted", source_path.display());
                Ok(TransferReport {
                    bytes,
                    elapsed: started.elapsed(),
                    timeout,
                })
            }
            Ok(_) => Err(reason),
            Err(_) => Err(Error::connection(format!(
                "copy of {} did not stop within {:?} after {}",
                source_path.display(),
                self.options.cleanup_grace,
                reason
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrolift_config::{Endpoint, UnitKind};
    use ferrolift_transport::LocalFs;
    use ferrolift_types::{DirEntry, WorkerCount};
    use proptest::prelude::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::fs;
    use std::io::Cursor;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn unit(staging: &Path, throughput: u64, max_timeout: Duration) -> UnitConfig {
        UnitConfig {
            name: "test".to_string(),
            kind: UnitKind::Download,
            source: Endpoint::Local,
            target: Endpoint::Local,
            source_path: PathBuf::from("/in"),
            target_path: PathBuf::from("/out"),
            workers: WorkerCount::new(1).unwrap(),
            throughput: Throughput::new(throughput).unwrap(),
            max_timeout,
            scan_interval: Duration::from_secs(1),
            preserve_mtime: true,
            staging_dir: staging.to_path_buf(),
        }
    }

    /// Reads from a local file but serves an endless slow stream
    struct SlowFs {
        local: LocalFs,
    }

    struct SlowReader;

    impl Read for SlowReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(10));
            let n = buf.len().min(16);
            buf[..n].fill(b'x');
            Ok(n)
        }
    }

    impl FileSystem for SlowFs {
        fn label(&self) -> &str {
            "slow"
        }
        fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
            self.local.read_dir(path)
        }
        fn stat(&self, path: &Path) -> Result<Option<FileStat>> {
            self.local.stat(path)
        }
        fn open_read(&self, _path: &Path) -> Result<Box<dyn Read + Send>> {
            Ok(Box::new(SlowReader))
        }
        fn create_write(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
            self.local.create_write(path)
        }
        fn remove(&self, path: &Path) -> Result<()> {
            self.local.remove(path)
        }
        fn mkdir_all(&self, path: &Path) -> Result<()> {
            self.local.mkdir_all(path)
        }
        fn set_mtime(&self, path: &Path, modified: SystemTime) -> Result<()> {
            self.local.set_mtime(path, modified)
        }
        fn rename(&self, from: &Path, to: &Path) -> Result<()> {
            self.local.rename(from, to)
        }
    }

    /// Local filesystem whose renames always fail
    struct NoRenameFs {
        local: LocalFs,
        renames: AtomicU32,
    }

    impl FileSystem for NoRenameFs {
        fn label(&self) -> &str {
            "no-rename"
        }
        fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
            self.local.read_dir(path)
        }
        fn stat(&self, path: &Path) -> Result<Option<FileStat>> {
            self.local.stat(path)
        }
        fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
            self.local.open_read(path)
        }
        fn create_write(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
            self.local.create_write(path)
        }
        fn remove(&self, path: &Path) -> Result<()> {
            self.local.remove(path)
        }
        fn mkdir_all(&self, path: &Path) -> Result<()> {
            self.local.mkdir_all(path)
        }
        fn set_mtime(&self, path: &Path, modified: SystemTime) -> Result<()> {
            self.local.set_mtime(path, modified)
        }
        fn rename(&self, from: &Path, _to: &Path) -> Result<()> {
            self.renames.fetch_add(1, Ordering::SeqCst);
            Err(Error::PermissionDenied {
                path: from.to_path_buf(),
            })
        }
    }

    fn executor(unit: &UnitConfig, shape: TransferShape, source: Arc<dyn FileSystem>) -> TransferExecutor {
        TransferExecutor::new(
            unit,
            shape,
            source,
            Arc::new(LocalFs::new()),
            Arc::new(RunContext::new()),
            "test0",
            PipelineOptions::fast(),
        )
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
    }

    #[rstest]
    #[case(10, 1_000, 600, 60)]
    #[case(10, 10_000_000, 600, 60)]
    #[case(10, 100_000_000, 600, 80)]
    #[case(10, 1_000_000_000, 600, 600)]
    #[case(1, 250_000, 1, 1)]
    #[case(100, 0, 30, 60)]
    fn test_compute_timeout(
        #[case] mbps: u64,
        #[case] size: u64,
        #[case] max: u64,
        #[case] expected: u64,
    ) {
        let timeout = compute_timeout(
            Throughput::new(mbps).unwrap(),
            size,
            Duration::from_secs(max),
        );
        assert_eq!(timeout, Duration::from_secs(expected));
    }

    proptest! {
        #[test]
        fn test_compute_timeout_bounds(
            mbps in 1u64..10_000,
            size in 0u64..1_000_000_000_000,
            max_secs in 1u64..7_200,
        ) {
            let max = Duration::from_secs(max_secs);
            let timeout = compute_timeout(Throughput::new(mbps).unwrap(), size, max);

            prop_assert!(timeout >= max.min(MIN_TRANSFER_TIMEOUT));
            prop_assert!(timeout <= max.max(MIN_TRANSFER_TIMEOUT));
        }

        #[test]
        fn test_compute_timeout_grows_with_size(
            mbps in 1u64..1_000,
            small in 0u64..10_000_000_000,
            extra in 0u64..10_000_000_000,
            max_secs in 60u64..7_200,
        ) {
            let throughput = Throughput::new(mbps).unwrap();
            let max = Duration::from_secs(max_secs);

            prop_assert!(
                compute_timeout(throughput, small, max)
                    <= compute_timeout(throughput, small + extra, max)
            );
        }
    }

    #[test]
    fn test_temp_file_name_layout() {
        assert_eq!(
            temp_file_name("inbound3", 1_700_000_000_123, 10_042),
            "inbound3_170000000012310042"
        );
    }

    #[test]
    fn test_copy_with_guard_copies_all_chunks() {
        let data = vec![7u8; 10_000];
        let mut reader = Cursor::new(data.clone());
        let mut writer = Vec::new();
        let guard = CopyGuard::new(CancellationToken::new(), Duration::from_secs(60));

        let bytes =
            copy_with_guard(&mut reader, &mut writer, &guard, 1024, Path::new("/in/a")).unwrap();

        assert_eq!(bytes, 10_000);
        assert_eq!(writer, data);
    }

    #[test]
    fn test_copy_with_guard_stops_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let guard = CopyGuard::new(token, Duration::from_secs(60));
        let mut writer = Vec::new();

        let err = copy_with_guard(
            &mut Cursor::new(vec![1u8; 64]),
            &mut writer,
            &guard,
            16,
            Path::new("/in/a"),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_copy_with_guard_reports_deadline() {
        let guard = CopyGuard::new(CancellationToken::new(), Duration::ZERO);
        let err = copy_with_guard(
            &mut Cursor::new(vec![1u8; 64]),
            &mut Vec::new(),
            &guard,
            16,
            Path::new("/in/a"),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_staged_transfer_commits_and_preserves_mtime() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        let source = dir.path().join("in/a.csv");
        let destination = dir.path().join("out/nested/a.csv");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"id,value\n1,2\n").unwrap();

        let unit = unit(&staging, 10, Duration::from_secs(600));
        let executor = executor(&unit, TransferShape::Staged, Arc::new(LocalFs::new()));
        let stat = FileStat::from_unix_secs(13, 1_600_000_000);
        let job = TransferJob {
            source: source.clone(),
            destination: destination.clone(),
            stat,
        };

        let report = executor.execute(job, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.bytes, 13);
        assert_eq!(report.timeout, MIN_TRANSFER_TIMEOUT);
        assert_eq!(fs::read(&destination).unwrap(), b"id,value\n1,2\n");
        let written = LocalFs::new().stat(&destination).unwrap().unwrap();
        assert_eq!(written.mtime_secs(), 1_600_000_000);
        assert_eq!(entries(&staging), 0);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_direct_transfer_creates_parents() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.bin");
        let destination = dir.path().join("remote/x/y/a.bin");
        fs::write(&source, vec![3u8; 100_000]).unwrap();

        let unit = unit(&dir.path().join("staging"), 10, Duration::from_secs(600));
        let executor = executor(&unit, TransferShape::Direct, Arc::new(LocalFs::new()));
        let job = TransferJob {
            source,
            destination: destination.clone(),
            stat: FileStat::from_unix_secs(100_000, 1_500_000_000),
        };

        let report = executor.execute(job, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.bytes, 100_000);
        assert_eq!(fs::metadata(&destination).unwrap().len(), 100_000);
        let written = LocalFs::new().stat(&destination).unwrap().unwrap();
        assert_eq!(written.mtime_secs(), 1_500_000_000);
        assert!(!dir.path().join("staging").exists());
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        let destination = dir.path().join("out/a.csv");

        let unit = unit(&staging, 10, Duration::from_secs(600));
        let executor = executor(&unit, TransferShape::Staged, Arc::new(LocalFs::new()));
        let job = TransferJob {
            source: dir.path().join("in/gone.csv"),
            destination: destination.clone(),
            stat: FileStat::from_unix_secs(1, 1),
        };

        let err = executor.execute(job, &CancellationToken::new()).await.unwrap_err();

        assert!(!err.is_connection_level());
        assert!(!destination.exists());
        assert_eq!(entries(&staging), 0);
    }

    #[tokio::test]
    async fn test_cancelled_staged_transfer_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        let destination = dir.path().join("out/big.bin");

        let unit = unit(&staging, 10, Duration::from_secs(600));
        let slow = Arc::new(SlowFs {
            local: LocalFs::new(),
        });
        let executor = executor(&unit, TransferShape::Staged, slow);
        let job = TransferJob {
            source: dir.path().join("in/big.bin"),
            destination: destination.clone(),
            stat: FileStat::from_unix_secs(1 << 30, 1),
        };

        let stop = CancellationToken::new();
        let canceller = {
            let stop = stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                stop.cancel();
            })
        };

        let err = executor.execute(job, &stop).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, Error::Cancelled));
        assert!(!destination.exists());
        assert_eq!(entries(&staging), 0);
    }

    #[tokio::test]
    async fn test_deadline_aborts_transfer() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        let destination = dir.path().join("out/slow.bin");

        // 250 KB at 1 Mbps needs 2 s, above the 1 s ceiling.
        let unit = unit(&staging, 1, Duration::from_secs(1));
        let slow = Arc::new(SlowFs {
            local: LocalFs::new(),
        });
        let executor = executor(&unit, TransferShape::Staged, slow);
        let job = TransferJob {
            source: dir.path().join("in/slow.bin"),
            destination: destination.clone(),
            stat: FileStat::from_unix_secs(250_000, 1),
        };

        let err = executor.execute(job, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, Error::Timeout { seconds: 1 }));
        assert!(!destination.exists());
        assert_eq!(entries(&staging), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_discards_temp_file() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        let source = dir.path().join("in/a.csv");
        let destination = dir.path().join("out/a.csv");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"locked").unwrap();

        let target = Arc::new(NoRenameFs {
            local: LocalFs::new(),
            renames: AtomicU32::new(0),
        });
        let unit = unit(&staging, 10, Duration::from_secs(600));
        let options = PipelineOptions::fast();
        let executor = TransferExecutor::new(
            &unit,
            TransferShape::Staged,
            Arc::new(LocalFs::new()),
            Arc::clone(&target) as Arc<dyn FileSystem>,
            Arc::new(RunContext::new()),
            "test0",
            options.clone(),
        );
        let job = TransferJob {
            source: source.clone(),
            destination: destination.clone(),
            stat: FileStat::from_unix_secs(6, 1),
        };

        let err = executor.execute(job, &CancellationToken::new()).await.unwrap_err();

        match err {
            Error::Rename { to, .. } => assert_eq!(to, destination),
            other => panic!("expected a rename error, got {other}"),
        }
        assert_eq!(target.renames.load(Ordering::SeqCst), options.rename_attempts);
        assert!(!destination.exists());
        assert_eq!(entries(&staging), 0);
        assert!(source.exists());
    }
}
