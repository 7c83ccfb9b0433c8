//! Transfer pipeline for ferrolift
//!
//! Each configured unit runs as one scanner feeding a bounded queue drained by
//! a pool of workers. The scanner walks the source, the workers move files and
//! a supervisor keeps both alive.
//!
//! # Features
//!
//! - **Backpressure**: the queue holds at most twice as many files as there are workers
//! - **Atomic downloads**: staged temp files are renamed into place
//! - **Per-file deadlines**: derived from the declared throughput
//! - **Reconnects**: exponential backoff, broken workers are recreated
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrolift_config::ConfigLoader;
//! use ferrolift_engine::{run_units, PipelineOptions, RunContext, ScanMode};
//! use ferrolift_transport::SshConnectionManager;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load_default()?;
//! let reports = run_units(
//!     config.all_units()?,
//!     Arc::new(RunContext::new()),
//!     Arc::new(SshConnectionManager::new()),
//!     PipelineOptions::default(),
//!     ScanMode::OneShot,
//! )
//! .await;
//! for report in reports {
//!     println!("{}: {} files", report.unit, report.stats.files_transferred);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backoff;
pub mod context;
pub mod differ;
pub mod executor;
pub mod options;
pub mod plan;
pub mod queue;
pub mod scanner;
pub mod session;
pub mod stats;
pub mod supervisor;
pub mod watch;
pub mod worker;

pub use backoff::{AdaptiveInterval, Backoff};
pub use context::RunContext;
pub use differ::{detect_change, needs_transfer, ChangeType};
pub use executor::{compute_timeout, TransferExecutor, TransferJob, TransferReport};
pub use options::PipelineOptions;
pub use plan::{TransferPlan, TransferShape};
pub use queue::{work_queue, Dispatch, Dispatcher, WorkItem, WorkReceiver};
pub use scanner::{ScanMode, Scanner};
pub use stats::{UnitReport, UnitStats};
pub use supervisor::{run_units, supervise, Supervisor};
pub use watch::WatchMap;
pub use worker::{Outcome, Worker};
