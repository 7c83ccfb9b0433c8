//! Opening and closing the filesystems an actor works on

use crate::backoff::Backoff;
use ferrolift_config::Endpoint;
use ferrolift_transport::{run_blocking, ConnectionManager, FileSystem, LocalFs};
use ferrolift_types::{ErrorSeverity, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Open `endpoint`, retrying with backoff until it connects.
///
/// Local endpoints never fail. Returns `None` when `stop` fires first. An
/// error that retrying cannot fix, such as a server without credentials,
/// waits the full backoff ceiling between attempts.
pub async fn open_endpoint(
    endpoint: &Endpoint,
    manager: &dyn ConnectionManager,
    retry: RetryPolicy,
    stop: &CancellationToken,
    owner: &str,
) -> Option<Arc<dyn FileSystem>> {
    let identity = match endpoint {
        Endpoint::Local => return Some(Arc::new(LocalFs::new())),
        Endpoint::Remote(identity) => identity,
    };

    let mut backoff = Backoff::from_policy(retry);
    loop {
        if stop.is_cancelled() {
            return None;
        }
        let attempt = tokio::select! {
            () = stop.cancelled() => return None,
            attempt = manager.connect(identity) => attempt,
        };
        match attempt {
            Ok(fs) => {
                debug!("{} connected to {}", owner, identity.name);
                return Some(fs);
            }
            Err(e) => {
                let delay = if e.is_recoverable() {
                    backoff.next_delay()
                } else {
                    retry.max_delay
                };
                if e.severity() >= ErrorSeverity::Critical {
                    error!(
                        "{} cannot connect to {}: {}, retrying in {:?}",
                        owner, identity.name, e, delay
                    );
                } else {
                    warn!(
                        "{} cannot connect to {}: {}, retrying in {:?}",
                        owner, identity.name, e, delay
                    );
                }
                tokio::select! {
                    () = stop.cancelled() => return None,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Close a session on the blocking pool, waiting at most `grace`.
///
/// A session wedged inside a call holds its own lock, so closing it can block
/// for as long as that call does. Past the grace the close is left running
/// detached and the caller moves on.
pub async fn close_endpoint(fs: Arc<dyn FileSystem>, grace: Duration) {
    let label = fs.label().to_string();
    let closing = run_blocking(move || {
        fs.close();
        Ok(())
    });
    match tokio::time::timeout(grace, closing).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Closing {} failed: {}", label, e),
        Err(_) => warn!("Session to {} did not close within {:?}, detaching it", label, grace),
    }
}
