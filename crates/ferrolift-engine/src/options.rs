//! Pipeline tuning that is not part of a unit's configuration

use ferrolift_types::RetryPolicy;
use std::time::Duration;

/// Timing and sizing knobs shared by every actor of a unit
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Reconnect backoff seeding
    pub retry: RetryPolicy,
    /// Copy chunk size; cancellation is checked between chunks
    pub chunk_size: usize,
    /// Attempts to commit a staged file
    pub rename_attempts: u32,
    /// Pause between commit attempts
    pub rename_delay: Duration,
    /// Attempts to remove a transferred source
    pub removal_attempts: u32,
    /// Removal attempt `i` is preceded by `i` times this delay
    pub removal_delay_step: Duration,
    /// How long an aborted copy may take to clean up before its session is
    /// considered wedged
    pub cleanup_grace: Duration,
    /// How long closing a session may block before it is detached
    pub close_grace: Duration,
    /// Pause before a crashed worker or scanner is recreated
    pub restart_delay: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunk_size: 32 * 1024,
            rename_attempts: 3,
            rename_delay: Duration::from_secs(1),
            removal_attempts: 3,
            removal_delay_step: Duration::from_millis(100),
            cleanup_grace: Duration::from_secs(5),
            close_grace: Duration::from_secs(5),
            restart_delay: Duration::from_secs(1),
        }
    }
}

impl PipelineOptions {
    /// Options with every delay shortened, for tests and local loopback runs
    pub fn fast() -> Self {
        Self {
            retry: RetryPolicy::new(Duration::from_millis(5), Duration::from_millis(50)),
            rename_delay: Duration::from_millis(10),
            removal_delay_step: Duration::from_millis(5),
            cleanup_grace: Duration::from_millis(500),
            close_grace: Duration::from_millis(200),
            restart_delay: Duration::from_millis(10),
            ..Self::default()
        }
    }
}
