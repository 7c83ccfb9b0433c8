//! Running a unit: one scanner, N workers, restarts

use crate::context::RunContext;
use crate::options::PipelineOptions;
use crate::queue::work_queue;
use crate::scanner::{ScanMode, Scanner};
use crate::stats::{UnitReport, UnitStats};
use crate::worker::Worker;
use ferrolift_config::UnitConfig;
use ferrolift_transport::ConnectionManager;
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Run tasks built by `factory` until `token` is cancelled.
///
/// A task that returns while the token is live is assumed to have crashed and
/// is recreated after `restart_delay`.
pub async fn supervise<F, Fut>(
    name: String,
    token: CancellationToken,
    restart_delay: Duration,
    mut factory: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        if token.is_cancelled() {
            break;
        }
        factory().await;
        if token.is_cancelled() {
            break;
        }
        warn!("{} exited, recreating", name);
        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(restart_delay) => {}
        }
    }
    debug!("{} supervision finished", name);
}

/// Owns one unit's scanner and workers
pub struct Supervisor {
    unit: Arc<UnitConfig>,
    ctx: Arc<RunContext>,
    manager: Arc<dyn ConnectionManager>,
    options: PipelineOptions,
    stats: Arc<UnitStats>,
    found: Arc<AtomicU64>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("unit", &self.unit.name)
            .field("kind", &self.unit.kind)
            .finish()
    }
}

impl Supervisor {
    /// Create a supervisor for `unit`
    pub fn new(unit: UnitConfig, ctx: Arc<RunContext>, manager: Arc<dyn ConnectionManager>) -> Self {
        Self {
            unit: Arc::new(unit),
            ctx,
            manager,
            options: PipelineOptions::default(),
            stats: Arc::new(UnitStats::new()),
            found: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the pipeline options
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// The supervised unit
    pub fn unit(&self) -> &UnitConfig {
        &self.unit
    }

    /// Live counters of the unit
    pub fn stats(&self) -> Arc<UnitStats> {
        Arc::clone(&self.stats)
    }

    /// Run the unit in `mode` and report on it
    pub async fn run(&self, mode: ScanMode) -> UnitReport {
        let started = Instant::now();
        info!(
            "Starting {} unit {} ({} -> {}, {} workers)",
            self.unit.kind,
            self.unit.name,
            self.unit.source.label(),
            self.unit.target.label(),
            self.unit.workers.get()
        );
        match mode {
            ScanMode::OneShot => self.run_once().await,
            ScanMode::Continuous => self.run_persistent().await,
        }
        let report = self.report(started.elapsed());
        info!(
            "Unit {} finished: {} transferred, {} skipped, {} failed",
            report.unit,
            report.stats.files_transferred,
            report.stats.files_skipped,
            report.stats.files_failed
        );
        report
    }

    fn report(&self, elapsed: Duration) -> UnitReport {
        UnitReport {
            unit: self.unit.name.clone(),
            kind: self.unit.kind,
            files_found: self.found.load(Ordering::Relaxed),
            stats: self.stats.snapshot(),
            elapsed,
        }
    }

    fn worker(&self, id: usize, token: CancellationToken) -> Worker {
        Worker::new(
            id,
            Arc::clone(&self.unit),
            Arc::clone(&self.ctx),
            Arc::clone(&self.manager),
            self.options.clone(),
            Arc::clone(&self.stats),
            token,
        )
    }

    fn scanner(&self, mode: ScanMode, token: CancellationToken) -> Scanner {
        Scanner::new(
            Arc::clone(&self.unit),
            Arc::clone(&self.manager),
            self.options.clone(),
            mode,
            token,
        )
        .with_found_counter(Arc::clone(&self.found))
    }

    /// One pass: scan, wait for the workers to finish it, return.
    ///
    /// Workers are not recreated; a worker that loses its session simply
    /// leaves the remaining files to its siblings.
    async fn run_once(&self) {
        let token = self.ctx.token().child_token();
        let (mut dispatcher, receiver) = work_queue(self.unit.workers.queue_capacity());

        let handles: Vec<_> = (0..self.unit.workers.get())
            .map(|id| {
                let mut worker = self.worker(id, token.child_token());
                let receiver = receiver.clone();
                tokio::spawn(async move { worker.run(receiver).await })
            })
            .collect();
        // Workers hold the only receivers; if they all exit, queued credits come back.
        drop(receiver);

        let mut scanner = self.scanner(ScanMode::OneShot, token.child_token());
        if let Err(e) = scanner.run(&mut dispatcher).await {
            error!("{}: scan failed: {}", self.unit.name, e);
        }
        drop(dispatcher);

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("{}: worker task failed: {}", self.unit.name, e);
            }
        }
    }

    /// Keep the scanner and every worker alive until shutdown
    async fn run_persistent(&self) {
        let token = self.ctx.token().child_token();
        let (dispatcher, receiver) = work_queue(self.unit.workers.queue_capacity());
        let dispatcher = Arc::new(Mutex::new(dispatcher));
        let delay = self.options.restart_delay;

        let mut handles = Vec::with_capacity(self.unit.workers.get() + 1);
        for id in 0..self.unit.workers.get() {
            let name = format!("{} worker {}", self.unit.name, id);
            let unit = Arc::clone(&self.unit);
            let ctx = Arc::clone(&self.ctx);
            let manager = Arc::clone(&self.manager);
            let options = self.options.clone();
            let stats = Arc::clone(&self.stats);
            let receiver = receiver.clone();
            let parent = token.clone();
            handles.push(tokio::spawn(supervise(name, token.clone(), delay, move || {
                let mut worker = Worker::new(
                    id,
                    Arc::clone(&unit),
                    Arc::clone(&ctx),
                    Arc::clone(&manager),
                    options.clone(),
                    Arc::clone(&stats),
                    parent.child_token(),
                );
                let receiver = receiver.clone();
                async move { worker.run(receiver).await }
            })));
        }

        {
            let name = format!("{} scanner", self.unit.name);
            let parent = token.clone();
            let unit = Arc::clone(&self.unit);
            let manager = Arc::clone(&self.manager);
            let options = self.options.clone();
            let found = Arc::clone(&self.found);
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(supervise(name, token.clone(), delay, move || {
                let mut scanner = Scanner::new(
                    Arc::clone(&unit),
                    Arc::clone(&manager),
                    options.clone(),
                    ScanMode::Continuous,
                    parent.child_token(),
                )
                .with_found_counter(Arc::clone(&found));
                let dispatcher = Arc::clone(&dispatcher);
                async move {
                    let mut dispatcher = dispatcher.lock().await;
                    if let Err(e) = scanner.run(&mut dispatcher).await {
                        warn!("Scanner stopped: {}", e);
                    }
                }
            })));
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("{}: supervised task failed: {}", self.unit.name, e);
            }
        }
    }
}

/// Run every unit concurrently in `mode` and collect their reports
pub async fn run_units(
    units: Vec<UnitConfig>,
    ctx: Arc<RunContext>,
    manager: Arc<dyn ConnectionManager>,
    options: PipelineOptions,
    mode: ScanMode,
) -> Vec<UnitReport> {
    let runs = units.into_iter().map(|unit| {
        let supervisor = Supervisor::new(unit, Arc::clone(&ctx), Arc::clone(&manager))
            .with_options(options.clone());
        async move { supervisor.run(mode).await }
    });
    join_all(runs).await
}
