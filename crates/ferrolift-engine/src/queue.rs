//! Bounded work queue with credit-based backpressure
//!
//! Every dispatched file carries a [`Credit`]. The credit is returned when the
//! item is dropped, which happens once a worker has finished with it (or when
//! the queue is torn down with items still buffered). The scanner can
//! therefore wait for every outstanding credit before it starts a new pass.
//!
//! ```rust
//! use ferrolift_engine::{work_queue, Dispatch};
//! use ferrolift_types::{FileObj, FileStat};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let (mut dispatcher, receiver) = work_queue(2);
//! let stop = CancellationToken::new();
//! let file = FileObj::new("/out/a.csv", FileStat::from_unix_secs(10, 0));
//! assert!(matches!(dispatcher.dispatch(file, &stop).await.unwrap(), Dispatch::Queued));
//! assert_eq!(dispatcher.outstanding(), 1);
//!
//! receiver.recv().await.unwrap().complete();
//! assert_eq!(dispatcher.outstanding(), 0);
//! # });
//! ```

use ferrolift_types::{Error, FileObj, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Proof that one slot of the queue is in use
#[derive(Debug)]
pub struct Credit {
    _permit: OwnedSemaphorePermit,
    returned: Arc<AtomicU64>,
}

impl Drop for Credit {
    fn drop(&mut self) {
        self.returned.fetch_add(1, Ordering::SeqCst);
    }
}

/// A file handed from the scanner to exactly one worker
#[derive(Debug)]
pub struct WorkItem {
    /// The file to transfer
    pub file: FileObj,
    credit: Credit,
}

impl WorkItem {
    /// Finish with this item, returning its credit
    pub fn complete(self) {
        drop(self.credit);
    }
}

/// Outcome of a dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The item was queued
    Queued,
    /// The stop token fired while waiting for a credit
    Stopped,
}

/// Producer side of the queue, owned by the scanner
#[derive(Debug)]
pub struct Dispatcher {
    sender: mpsc::Sender<WorkItem>,
    credits: Arc<Semaphore>,
    capacity: usize,
    dispatched: u64,
    returned: Arc<AtomicU64>,
}

/// Consumer side of the queue, shared by the workers
#[derive(Debug, Clone)]
pub struct WorkReceiver {
    inner: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
}

/// Create a queue holding at most `capacity` outstanding files
pub fn work_queue(capacity: usize) -> (Dispatcher, WorkReceiver) {
    let capacity = capacity.max(1);
    let (sender, receiver) = mpsc::channel(capacity);
    let dispatcher = Dispatcher {
        sender,
        credits: Arc::new(Semaphore::new(capacity)),
        capacity,
        dispatched: 0,
        returned: Arc::new(AtomicU64::new(0)),
    };
    let receiver = WorkReceiver {
        inner: Arc::new(Mutex::new(receiver)),
    };
    (dispatcher, receiver)
}

impl Dispatcher {
    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Files handed out and not yet finished
    pub fn outstanding(&self) -> usize {
        self.capacity - self.credits.available_permits()
    }

    /// Total files dispatched by this queue
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Total credits returned by workers
    pub fn returned(&self) -> u64 {
        self.returned.load(Ordering::SeqCst)
    }

    /// Queue a file, waiting for one credit when the queue is full.
    ///
    /// Fails when every receiver is gone.
    pub async fn dispatch(&mut self, file: FileObj, stop: &CancellationToken) -> Result<Dispatch> {
        let permit = match Arc::clone(&self.credits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!("Work queue is full, waiting for a worker to finish");
                tokio::select! {
                    () = stop.cancelled() => return Ok(Dispatch::Stopped),
                    permit = Arc::clone(&self.credits).acquire_owned() => {
                        permit.map_err(|_| Error::other("work queue credits closed"))?
                    }
                }
            }
        };
        let item = WorkItem {
            file,
            credit: Credit {
                _permit: permit,
                returned: Arc::clone(&self.returned),
            },
        };
        // A free credit implies a free channel slot.
        self.sender
            .send(item)
            .await
            .map_err(|_| Error::other("work queue has no receivers left"))?;
        self.dispatched += 1;
        Ok(Dispatch::Queued)
    }

    /// Wait until every dispatched file has been finished.
    ///
    /// Returns `false` when the stop token fired first.
    pub async fn drain(&self, stop: &CancellationToken) -> bool {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        tokio::select! {
            () = stop.cancelled() => false,
            permits = self.credits.acquire_many(all) => permits.is_ok(),
        }
    }
}

impl WorkReceiver {
    /// Take the next file, `None` once the dispatcher is gone and the queue is empty
    pub async fn recv(&self) -> Option<WorkItem> {
        self.inner.lock().await.recv().await
    }
}
