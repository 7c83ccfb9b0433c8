//! Core type system and error handling for ferrolift
//!
//! This crate provides the foundational types shared by every ferrolift crate:
//!
//! - **Error handling**: the pipeline's error taxonomy with severity levels
//! - **Core types**: file snapshots, directory entries and transfer statistics
//! - **Configuration values**: validated worker counts, throughput and retry seeding
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrolift_types::{Error, Result, TransferStats};
//!
//! fn example_operation() -> Result<TransferStats> {
//!     let mut stats = TransferStats::new();
//!     stats.files_transferred = 10;
//!     stats.bytes_transferred = 1024 * 1024;
//!     Ok(stats)
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::{RetryPolicy, Throughput, WorkerCount};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use types::*;
