//! Configuration value types for ferrolift
//!
//! Validated newtypes shared by the configuration loader and the engine.

use std::time::Duration;

/// Number of workers per transfer unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct WorkerCount(usize);

impl WorkerCount {
    /// Minimum worker count
    pub const MIN: usize = 1;
    /// Maximum worker count
    pub const MAX: usize = 256;

    /// Create a new worker count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Worker count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Worker count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Get the worker count value
    pub fn get(self) -> usize {
        self.0
    }

    /// Capacity of the work queue feeding this many workers
    pub fn queue_capacity(self) -> usize {
        self.0 * 2
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<usize> for WorkerCount {
    type Error = String;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

impl From<WorkerCount> for usize {
    fn from(count: WorkerCount) -> Self {
        count.0
    }
}

/// Declared link throughput in megabits per second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u64", into = "u64"))]
pub struct Throughput(u64);

impl Throughput {
    /// Default throughput (10 Mbps)
    pub const DEFAULT: u64 = 10;
    /// Bytes per second carried by one megabit per second
    pub const BYTES_PER_MBPS: u64 = 125_000;

    /// Create a new throughput with validation
    pub fn new(mbps: u64) -> Result<Self, String> {
        if mbps == 0 {
            Err("Throughput must be greater than 0 Mbps".to_string())
        } else {
            Ok(Self(mbps))
        }
    }

    /// Get the throughput in Mbps
    pub fn get(self) -> u64 {
        self.0
    }

    /// Throughput in bytes per second
    pub fn bytes_per_second(self) -> u64 {
        self.0.saturating_mul(Self::BYTES_PER_MBPS)
    }
}

impl Default for Throughput {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<u64> for Throughput {
    type Error = String;

    fn try_from(mbps: u64) -> Result<Self, Self::Error> {
        Self::new(mbps)
    }
}

impl From<Throughput> for u64 {
    fn from(throughput: Throughput) -> Self {
        throughput.0
    }
}

/// Reconnect backoff seeding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay the backoff sequence is seeded with
    pub initial_delay: Duration,
    /// Ceiling of the backoff sequence
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(600),
        }
    }
}
