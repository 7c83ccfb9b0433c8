//! Per-file transfer loop

use crate::context::RunContext;
use crate::differ::detect_change;
use crate::executor::{TransferExecutor, TransferJob};
use crate::options::PipelineOptions;
use crate::plan::TransferPlan;
use crate::queue::WorkReceiver;
use crate::session::{close_endpoint, open_endpoint};
use crate::stats::UnitStats;
use ferrolift_config::UnitConfig;
use ferrolift_transport::{relative_to, run_blocking, ConnectionManager, FileSystem};
use ferrolift_types::{Error, ErrorKind, ErrorSeverity, FileObj, FileStat, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to one dispatched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The file was moved
    Transferred,
    /// The destination was already current
    Skipped,
    /// The file could not be moved; it stays where it was
    Failed,
}

/// Pulls files off the queue and moves them, one at a time.
///
/// A worker owns one session per remote endpoint. When a session is found to
/// be broken the worker exits, and its supervisor recreates it.
pub struct Worker {
    id: usize,
    unit: Arc<UnitConfig>,
    ctx: Arc<RunContext>,
    manager: Arc<dyn ConnectionManager>,
    options: PipelineOptions,
    stats: Arc<UnitStats>,
    plan: TransferPlan,
    token: CancellationToken,
    must_exit: bool,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("unit", &self.unit.name)
            .field("id", &self.id)
            .field("must_exit", &self.must_exit)
            .finish()
    }
}

impl Worker {
    /// Create worker `id` of `unit`, stopped by `token`
    pub fn new(
        id: usize,
        unit: Arc<UnitConfig>,
        ctx: Arc<RunContext>,
        manager: Arc<dyn ConnectionManager>,
        options: PipelineOptions,
        stats: Arc<UnitStats>,
        token: CancellationToken,
    ) -> Self {
        let plan = TransferPlan::for_unit(&unit);
        Self {
            id,
            unit,
            ctx,
            manager,
            options,
            stats,
            plan,
            token,
            must_exit: false,
        }
    }

    /// Prefix of this worker's staged temp files
    pub fn temp_prefix(&self) -> String {
        format!("{}{}", self.unit.name, self.id)
    }

    /// Stop the worker; it returns after the file in hand
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether the worker gave up on its sessions
    pub fn must_exit(&self) -> bool {
        self.must_exit
    }

    /// Connect both endpoints and process files until stopped, the queue
    /// closes or a session breaks.
    pub async fn run(&mut self, receiver: WorkReceiver) {
        let owner = format!("{} worker {}", self.unit.name, self.id);
        let retry = self.options.retry;
        let Some(source) = open_endpoint(
            &self.unit.source,
            self.manager.as_ref(),
            retry,
            &self.token,
            &owner,
        )
        .await
        else {
            return;
        };
        let Some(target) = open_endpoint(
            &self.unit.target,
            self.manager.as_ref(),
            retry,
            &self.token,
            &owner,
        )
        .await
        else {
            close_endpoint(source, self.options.close_grace).await;
            return;
        };

        let executor = TransferExecutor::new(
            &self.unit,
            self.plan.shape,
            Arc::clone(&source),
            Arc::clone(&target),
            Arc::clone(&self.ctx),
            self.temp_prefix(),
            self.options.clone(),
        );
        debug!("{} ready", owner);

        loop {
            let item = tokio::select! {
                biased;
                () = self.token.cancelled() => break,
                item = receiver.recv() => item,
            };
            let Some(item) = item else {
                break;
            };
            self.process(&item.file, &source, &target, &executor).await;
            item.complete();
            if self.must_exit {
                warn!("{} lost a session, exiting", owner);
                break;
            }
        }

        close_endpoint(source, self.options.close_grace).await;
        close_endpoint(target, self.options.close_grace).await;
        debug!("{} stopped", owner);
    }

    /// Move one file and record the outcome
    pub async fn process(
        &mut self,
        file: &FileObj,
        source: &Arc<dyn FileSystem>,
        target: &Arc<dyn FileSystem>,
        executor: &TransferExecutor,
    ) -> Outcome {
        let Some(relative) = relative_to(&file.path, &self.unit.source_path) else {
            error!(
                "{}: {} is outside {}",
                self.unit.name,
                file.path.display(),
                self.unit.source_path.display()
            );
            self.stats.record_failure();
            return Outcome::Failed;
        };
        let destination = target.join(&self.unit.target_path, &relative);

        if self.plan.use_differ {
            let current = tokio::select! {
                () = self.token.cancelled() => Err(Error::Cancelled),
                current = stat_on(target, &destination) => current,
            };
            match current {
                Ok(current) => {
                    if let Some(change) = detect_change(current.as_ref(), &file.stat) {
                        debug!("{}: {} {:?}", self.unit.name, relative.display(), change);
                    } else {
                        debug!("{}: {} is current", self.unit.name, relative.display());
                        self.stats.record_skip();
                        return Outcome::Skipped;
                    }
                }
                Err(e @ (Error::Cancelled | Error::Connection { .. })) => {
                    self.fail(file, &e, source, target).await;
                    return Outcome::Failed;
                }
                Err(e) => {
                    debug!(
                        "{}: cannot stat {}, treating as absent: {}",
                        self.unit.name,
                        destination.display(),
                        e
                    );
                }
            }
        }

        let job = TransferJob {
            source: file.path.clone(),
            destination: destination.clone(),
            stat: file.stat,
        };
        match executor.execute(job, &self.token).await {
            Ok(report) => {
                self.stats.record_transfer(report.bytes, report.elapsed);
                info!(
                    "{}: {} -> {} ({} bytes in {:.2?}, {:.2} Mbps)",
                    self.unit.name,
                    file.path.display(),
                    destination.display(),
                    report.bytes,
                    report.elapsed,
                    report.megabits_per_second()
                );
                if self.plan.remove_source {
                    match self.remove_source(source, &file.path).await {
                        Ok(()) => self.stats.record_removal(),
                        Err(e) => error!("{}: {}", self.unit.name, e),
                    }
                }
                Outcome::Transferred
            }
            Err(e) => {
                self.fail(file, &e, source, target).await;
                Outcome::Failed
            }
        }
    }

    async fn fail(
        &mut self,
        file: &FileObj,
        error: &Error,
        source: &Arc<dyn FileSystem>,
        target: &Arc<dyn FileSystem>,
    ) {
        self.stats.record_failure();
        log_failure(&self.unit.name, &file.path, error);
        if matches!(error.kind(), ErrorKind::Cancelled | ErrorKind::Connection) {
            self.must_exit = true;
            return;
        }

        for fs in [source, target] {
            let alive = {
                let fs = Arc::clone(fs);
                let pinging = run_blocking(move || fs.ping());
                tokio::select! {
                    () = self.token.cancelled() => Err(Error::Cancelled),
                    answer = tokio::time::timeout(self.options.close_grace, pinging) => {
                        answer.unwrap_or_else(|_| Err(Error::connection("session did not answer")))
                    }
                }
            };
            if let Err(e) = alive {
                warn!("{}: session to {} is gone: {}", self.unit.name, fs.label(), e);
                self.must_exit = true;
            }
        }
    }

    /// Remove a transferred source, retrying until it is confirmed gone
    async fn remove_source(&self, source: &Arc<dyn FileSystem>, path: &Path) -> Result<()> {
        let attempts = self.options.removal_attempts.max(1);
        let mut last = String::from("still present");
        for attempt in 1..=attempts {
            tokio::time::sleep(self.options.removal_delay_step * attempt).await;

            let removal = {
                let fs = Arc::clone(source);
                let path = path.to_path_buf();
                run_blocking(move || fs.remove(&path)).await
            };
            if let Err(e) = &removal {
                debug!(
                    "Removing {} failed (attempt {}/{}): {}",
                    path.display(),
                    attempt,
                    attempts,
                    e
                );
                last = e.to_string();
            }
            match stat_on(source, path).await {
                Ok(None) => return Ok(()),
                Ok(Some(_)) => {}
                Err(e) => last = e.to_string(),
            }
        }
        Err(Error::remove_source(path, last))
    }
}

/// Log a failed file at the level its error deserves
fn log_failure(unit: &str, path: &Path, error: &Error) {
    match error.severity() {
        ErrorSeverity::Low => info!("{}: {} not transferred: {}", unit, path.display(), error),
        ErrorSeverity::Medium => warn!("{}: {} failed: {}", unit, path.display(), error),
        ErrorSeverity::High | ErrorSeverity::Critical => {
            error!("{}: {} failed: {}", unit, path.display(), error);
        }
    }
}

async fn stat_on(fs: &Arc<dyn FileSystem>, path: &Path) -> Result<Option<FileStat>> {
    let fs = Arc::clone(fs);
    let path: PathBuf = path.to_path_buf();
    run_blocking(move || fs.stat(&path)).await
}
