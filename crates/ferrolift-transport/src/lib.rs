//! Local and SFTP filesystem access for ferrolift
//!
//! Both sides of a transfer are reached through the [`FileSystem`] trait: the
//! local disk through [`LocalFs`], remote servers through [`SftpFs`] sessions
//! opened by a [`ConnectionManager`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrolift_config::ServerIdentity;
//! use ferrolift_transport::{ConnectionManager, SshConnectionManager};
//! use std::path::Path;
//!
//! # async fn example() -> ferrolift_types::Result<()> {
//! let server = ServerIdentity::with_password("edge", "10.0.0.5", "ops", "secret");
//! let session = SshConnectionManager::new().connect(&server).await?;
//! let listing = session.read_dir(Path::new("/outbound"))?;
//! println!("{} entries", listing.len());
//! # Ok(())
//! # }
//! ```
//!
//! Loopback sessions resolve every server to the local disk:
//!
//! ```rust
//! use ferrolift_config::ServerIdentity;
//! use ferrolift_transport::{ConnectionManager, LoopbackConnectionManager};
//! use std::path::Path;
//!
//! # tokio_test::block_on(async {
//! let server = ServerIdentity::with_password("edge", "localhost", "ops", "secret");
//! let session = LoopbackConnectionManager::new().connect(&server).await.unwrap();
//! assert!(session.stat(Path::new("/no/such/ferrolift/file")).unwrap().is_none());
//! # });
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod fs;
pub mod local;
pub mod sftp;

pub use connection::{ConnectionManager, LoopbackConnectionManager, SshConnectionManager};
pub use fs::{relative_to, run_blocking, FileSystem};
pub use local::LocalFs;
pub use sftp::SftpFs;
