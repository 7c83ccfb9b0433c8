//! Source walking and dispatch

use crate::backoff::AdaptiveInterval;
use crate::options::PipelineOptions;
use crate::plan::TransferPlan;
use crate::queue::{Dispatch, Dispatcher};
use crate::session::{close_endpoint, open_endpoint};
use crate::watch::WatchMap;
use ferrolift_config::UnitConfig;
use ferrolift_transport::{run_blocking, ConnectionManager, FileSystem};
use ferrolift_types::{FileObj, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a scanner keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// One pass, then wait for the workers and return
    OneShot,
    /// Pass after pass until stopped
    Continuous,
}

/// Walks a unit's source tree and feeds the work queue.
///
/// Every pass ends by waiting until all dispatched files are finished, so a
/// file is never queued twice while it is still in flight.
pub struct Scanner {
    unit: Arc<UnitConfig>,
    manager: Arc<dyn ConnectionManager>,
    options: PipelineOptions,
    mode: ScanMode,
    watch: Option<WatchMap>,
    interval: AdaptiveInterval,
    found: Arc<AtomicU64>,
    token: CancellationToken,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("unit", &self.unit.name)
            .field("mode", &self.mode)
            .field("interval", &self.interval.current())
            .finish()
    }
}

impl Scanner {
    /// Create a scanner for `unit`, stopped by `token`
    pub fn new(
        unit: Arc<UnitConfig>,
        manager: Arc<dyn ConnectionManager>,
        options: PipelineOptions,
        mode: ScanMode,
        token: CancellationToken,
    ) -> Self {
        let plan = TransferPlan::for_unit(&unit);
        Self {
            interval: AdaptiveInterval::new(unit.scan_interval),
            watch: plan.watch_source.then(WatchMap::new),
            unit,
            manager,
            options,
            mode,
            found: Arc::new(AtomicU64::new(0)),
            token,
        }
    }

    /// Count dispatched files into an existing counter
    #[must_use]
    pub fn with_found_counter(mut self, found: Arc<AtomicU64>) -> Self {
        self.found = found;
        self
    }

    /// Counter of files dispatched, shared with whoever reports on the unit
    pub fn found_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.found)
    }

    /// Stop the scanner; it returns at its next suspension point
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Connect to the source and scan until stopped, done or disconnected.
    ///
    /// Returns an error only when the source session was lost, so the caller
    /// can recreate the scanner.
    pub async fn run(&mut self, dispatcher: &mut Dispatcher) -> Result<()> {
        let owner = format!("{} scanner", self.unit.name);
        let Some(fs) = open_endpoint(
            &self.unit.source,
            self.manager.as_ref(),
            self.options.retry,
            &self.token,
            &owner,
        )
        .await
        else {
            return Ok(());
        };

        let result = self.scan_loop(&fs, dispatcher).await;
        close_endpoint(fs, self.options.close_grace).await;
        result
    }

    async fn scan_loop(&mut self, fs: &Arc<dyn FileSystem>, dispatcher: &mut Dispatcher) -> Result<()> {
        // A recreated scanner must not re-queue files a predecessor left in flight.
        if !dispatcher.drain(&self.token).await {
            return Ok(());
        }
        loop {
            if self.token.is_cancelled() {
                return Ok(());
            }
            let dispatched = self.scan_once(fs, dispatcher).await?;
            if dispatched > 0 {
                debug!(
                    "{}: dispatched {} files, waiting for workers",
                    self.unit.name, dispatched
                );
            }
            if !dispatcher.drain(&self.token).await {
                return Ok(());
            }
            if self.mode == ScanMode::OneShot {
                return Ok(());
            }

            let delay = self.interval.after_pass(dispatched > 0);
            tokio::select! {
                () = self.token.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One full walk of the source tree, returning how many files were queued.
    ///
    /// Unreadable directories are logged and skipped; a lost session ends the
    /// walk with an error.
    pub async fn scan_once(
        &mut self,
        fs: &Arc<dyn FileSystem>,
        dispatcher: &mut Dispatcher,
    ) -> Result<u64> {
        if let Some(watch) = self.watch.as_mut() {
            watch.begin_pass();
        }

        let mut stack: Vec<PathBuf> = vec![self.unit.source_path.clone()];
        let mut dispatched = 0u64;
        while let Some(dir) = stack.pop() {
            if self.token.is_cancelled() {
                return Ok(dispatched);
            }
            let listing = {
                let fs = Arc::clone(fs);
                let dir = dir.clone();
                tokio::select! {
                    () = self.token.cancelled() => return Ok(dispatched),
                    listing = run_blocking(move || fs.read_dir(&dir)) => listing,
                }
            };
            let mut entries = match listing {
                Ok(entries) => entries,
                Err(e) if e.is_connection_level() => {
                    warn!("{}: lost source while scanning: {}", self.unit.name, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{}: skipping {}: {}", self.unit.name, dir.display(), e);
                    continue;
                }
            };
            entries.sort_by(|a, b| a.path.cmp(&b.path));

            for entry in entries {
                if self.token.is_cancelled() {
                    return Ok(dispatched);
                }
                if entry.is_dir {
                    stack.push(entry.path);
                    continue;
                }
                if let Some(watch) = self.watch.as_mut() {
                    if !watch.observe(&entry.path, &entry.stat) {
                        continue;
                    }
                }
                let file = FileObj::new(entry.path, entry.stat);
                match dispatcher.dispatch(file, &self.token).await? {
                    Dispatch::Queued => {
                        dispatched += 1;
                        self.found.fetch_add(1, Ordering::Relaxed);
                    }
                    Dispatch::Stopped => return Ok(dispatched),
                }
            }
        }

        if let Some(watch) = self.watch.as_mut() {
            watch.end_pass();
        }
        if dispatched > 0 {
            info!("{}: found {} files", self.unit.name, dispatched);
        }
        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::work_queue;
    use ferrolift_config::{Endpoint, SyncDirection, UnitKind};
    use ferrolift_transport::{LocalFs, LoopbackConnectionManager};
    use ferrolift_types::{DirEntry, FileStat, Throughput, WorkerCount};
    use std::fs;
    use std::io::{Read, Write};
    use std::path::Path;
    use std::sync::atomic::AtomicBool;
    use std::time::{Duration, Instant, SystemTime};
    use tempfile::TempDir;

    fn unit(kind: UnitKind, source: &Path) -> Arc<UnitConfig> {
        Arc::new(UnitConfig {
            name: "scan".to_string(),
            kind,
            source: Endpoint::Local,
            target: Endpoint::Local,
            source_path: source.to_path_buf(),
            target_path: PathBuf::from("/unused"),
            workers: WorkerCount::new(1).unwrap(),
            throughput: Throughput::new(10).unwrap(),
            max_timeout: Duration::from_secs(600),
            scan_interval: Duration::from_millis(10),
            preserve_mtime: true,
            staging_dir: std::env::temp_dir(),
        })
    }

    fn scanner(unit: Arc<UnitConfig>, mode: ScanMode) -> Scanner {
        Scanner::new(
            unit,
            Arc::new(LoopbackConnectionManager::new()),
            PipelineOptions::fast(),
            mode,
            CancellationToken::new(),
        )
    }

    fn local() -> Arc<dyn FileSystem> {
        Arc::new(LocalFs::new())
    }

    #[tokio::test]
    async fn test_walk_dispatches_every_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("top.txt"), b"1").unwrap();
        fs::write(dir.path().join("a/mid.txt"), b"2").unwrap();
        fs::write(dir.path().join("a/b/deep.txt"), b"3").unwrap();

        let (mut dispatcher, receiver) = work_queue(8);
        let mut scanner = scanner(unit(UnitKind::Download, dir.path()), ScanMode::OneShot);

        let dispatched = scanner.scan_once(&local(), &mut dispatcher).await.unwrap();
        assert_eq!(dispatched, 3);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let item = receiver.recv().await.unwrap();
            seen.push(item.file.path.clone());
            item.complete();
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                dir.path().join("a/b/deep.txt"),
                dir.path().join("a/mid.txt"),
                dir.path().join("top.txt"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_an_empty_pass() {
        let dir = TempDir::new().unwrap();
        let (mut dispatcher, _receiver) = work_queue(2);
        let mut scanner = scanner(
            unit(UnitKind::Download, &dir.path().join("missing")),
            ScanMode::OneShot,
        );

        let dispatched = scanner.scan_once(&local(), &mut dispatcher).await.unwrap();
        assert_eq!(dispatched, 0);
    }

    #[tokio::test]
    async fn test_watch_holds_back_unchanged_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.csv");
        fs::write(&file, b"v1").unwrap();

        let (mut dispatcher, receiver) = work_queue(4);
        let mut scanner = scanner(
            unit(UnitKind::Sync(SyncDirection::LocalToServer), dir.path()),
            ScanMode::Continuous,
        );
        let fs_local = local();

        assert_eq!(scanner.scan_once(&fs_local, &mut dispatcher).await.unwrap(), 1);
        receiver.recv().await.unwrap().complete();

        assert_eq!(scanner.scan_once(&fs_local, &mut dispatcher).await.unwrap(), 0);

        let later = std::time::SystemTime::now() + Duration::from_secs(5);
        LocalFs::new().set_mtime(&file, later).unwrap();
        assert_eq!(scanner.scan_once(&fs_local, &mut dispatcher).await.unwrap(), 1);
        receiver.recv().await.unwrap().complete();
    }

    #[tokio::test]
    async fn test_download_scanner_redispatches_every_pass() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();

        let (mut dispatcher, receiver) = work_queue(4);
        let mut scanner = scanner(unit(UnitKind::Download, dir.path()), ScanMode::Continuous);
        let fs_local = local();

        for _ in 0..2 {
            assert_eq!(scanner.scan_once(&fs_local, &mut dispatcher).await.unwrap(), 1);
            receiver.recv().await.unwrap().complete();
        }
    }

    #[tokio::test]
    async fn test_one_shot_run_drains_and_returns() {
        let dir = TempDir::new().unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }

        // Capacity 2 forces the scanner to wait on credits mid-pass.
        let (mut dispatcher, receiver) = work_queue(2);
        let worker = tokio::spawn(async move {
            let mut handled = 0;
            while let Some(item) = receiver.recv().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
                item.complete();
                handled += 1;
            }
            handled
        });

        let mut scanner = scanner(unit(UnitKind::Download, dir.path()), ScanMode::OneShot);
        let found = scanner.found_counter();
        scanner.run(&mut dispatcher).await.unwrap();

        assert_eq!(found.load(Ordering::Relaxed), 5);
        assert_eq!(dispatcher.outstanding(), 0);
        drop(dispatcher);
        assert_eq!(worker.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_continuous_run_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let (mut dispatcher, _receiver) = work_queue(2);
        let mut scanner = scanner(unit(UnitKind::Download, dir.path()), ScanMode::Continuous);

        let token = scanner.token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let outcome =
            tokio::time::timeout(Duration::from_secs(5), scanner.run(&mut dispatcher)).await;
        assert!(matches!(outcome, Ok(Ok(()))));
    }

    /// Local filesystem that runs a hook before every listing
    struct HookedFs {
        local: LocalFs,
        on_list: Box<dyn Fn() + Send + Sync>,
    }

    impl FileSystem for HookedFs {
        fn label(&self) -> &str {
            "hooked"
        }
        fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
            (self.on_list)();
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
        fn rename(&self, from: &Path, to: &Path) -> Result<()> {
            self.local.rename(from, to)
        }
    }

    #[tokio::test]
    async fn test_stop_during_listing_dispatches_nothing() {
        let dir = TempDir::new().unwrap();
        for name in ["a", "b", "c", "d"] {
            fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }

        let (mut dispatcher, _receiver) = work_queue(8);
        let mut scanner = scanner(unit(UnitKind::Download, dir.path()), ScanMode::OneShot);
        let token = scanner.token.clone();
        let fs: Arc<dyn FileSystem> = Arc::new(HookedFs {
            local: LocalFs::new(),
            on_list: Box::new(move || token.cancel()),
        });

        let dispatched = scanner.scan_once(&fs, &mut dispatcher).await.unwrap();

        assert_eq!(dispatched, 0);
        assert_eq!(dispatcher.dispatched(), 0);
    }

    #[tokio::test]
    async fn test_stalled_listing_yields_to_stop() {
        let dir = TempDir::new().unwrap();
        let released = Arc::new(AtomicBool::new(false));
        let stalled = Arc::clone(&released);
        let fs: Arc<dyn FileSystem> = Arc::new(HookedFs {
            local: LocalFs::new(),
            on_list: Box::new(move || {
                while !stalled.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(10));
                }
            }),
        });

        let (mut dispatcher, _receiver) = work_queue(2);
        let mut scanner = scanner(unit(UnitKind::Download, dir.path()), ScanMode::OneShot);
        let token = scanner.token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(Duration::from_secs(2), scanner.scan_once(&fs, &mut dispatcher))
                .await;
        released.store(true, Ordering::SeqCst);

        assert!(matches!(outcome, Ok(Ok(0))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
