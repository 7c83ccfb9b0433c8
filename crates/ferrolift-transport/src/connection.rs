//! Session establishment

use crate::fs::{run_blocking, FileSystem};
use crate::local::LocalFs;
use crate::sftp::SftpFs;
use ferrolift_config::ServerIdentity;
use ferrolift_types::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Opens sessions to named servers.
///
/// Implementations never retry; reconnect loops own the backoff.
#[async_trait::async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Open a session to `identity`
    async fn connect(&self, identity: &ServerIdentity) -> Result<Arc<dyn FileSystem>>;
}

/// [`ConnectionManager`] that opens SFTP sessions with ssh2
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnectionManager;

impl SshConnectionManager {
    /// Create a new SSH connection manager
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ConnectionManager for SshConnectionManager {
    async fn connect(&self, identity: &ServerIdentity) -> Result<Arc<dyn FileSystem>> {
        debug!(
            "Connecting to server {} with user {}",
            identity.address(),
            identity.user
        );
        let target = identity.clone();
        let fs = run_blocking(move || SftpFs::connect(&target)).await?;
        info!(
            "Connected to server {} with user {}",
            identity.address(),
            identity.user
        );
        Ok(Arc::new(fs))
    }
}

/// [`ConnectionManager`] that resolves every server to the local filesystem.
///
/// Used for single-host deployments and tests. It can be told to fail the
/// first N connection attempts to exercise reconnect loops.
#[derive(Debug, Default)]
pub struct LoopbackConnectionManager {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl LoopbackConnectionManager {
    /// Create a loopback manager that always connects
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loopback manager whose first `failures` attempts fail
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of connection attempts seen so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConnectionManager for LoopbackConnectionManager {
    async fn connect(&self, identity: &ServerIdentity) -> Result<Arc<dyn FileSystem>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::connection(format!(
                "loopback connection to {} refused",
                identity.name
            )));
        }
        Ok(Arc::new(LocalFs::named(identity.name.clone())))
    }
}
