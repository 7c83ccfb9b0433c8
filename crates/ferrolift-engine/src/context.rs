//! State shared by every supervisor of one process

use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// First value of the temp-name index band
pub const TEMP_INDEX_START: u32 = 10_000;

/// Last value of the temp-name index band before it wraps
pub const TEMP_INDEX_END: u32 = 90_000;

/// Process-wide run state, passed by reference to every actor.
///
/// Holds the staged-file index counter and the termination token. Cancelling
/// the token is both the termination flag and the stop broadcast: scanners,
/// workers and in-flight transfers all observe it.
#[derive(Debug)]
pub struct RunContext {
    temp_index: AtomicU32,
    token: CancellationToken,
}

impl RunContext {
    /// Create a fresh context
    pub fn new() -> Self {
        Self {
            temp_index: AtomicU32::new(TEMP_INDEX_START),
            token: CancellationToken::new(),
        }
    }

    /// Next temp-name index, wrapping inside the band
    pub fn next_temp_index(&self) -> u32 {
        match self
            .temp_index
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |index| {
                Some(if index >= TEMP_INDEX_END {
                    TEMP_INDEX_START
                } else {
                    index + 1
                })
            }) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// The termination token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether shutdown has been requested
    pub fn is_terminating(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request graceful shutdown of every actor
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested, stopping scanners and workers");
        }
        self.token.cancel();
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
