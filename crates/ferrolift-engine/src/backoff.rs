//! Reconnect backoff and adaptive scan pacing

use ferrolift_types::RetryPolicy;
use std::time::Duration;

/// Ceiling of the adaptive scan interval, as a multiple of the base
pub const MAX_INTERVAL_MULTIPLIER: u32 = 16;

/// Exponential backoff with a ceiling.
///
/// The delay doubles while it is below half the ceiling and jumps to the
/// ceiling otherwise, so it never overshoots.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a backoff seeded with `initial` and capped at `max`
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial, max }
    }

    /// Create a backoff from a retry policy
    pub fn from_policy(policy: RetryPolicy) -> Self {
        Self::new(policy.initial_delay, policy.max_delay)
    }

    /// Re-seed the sequence
    pub fn reset(&mut self, initial: Duration, max: Duration) {
        self.next = initial;
        self.max = max;
    }

    /// Advance and return the next delay
    pub fn next_delay(&mut self) -> Duration {
        if self.next < self.max / 2 {
            self.next *= 2;
        } else {
            self.next = self.max;
        }
        self.next
    }
}

/// Scan interval that stretches while passes find nothing.
///
/// Doubles after every empty pass up to sixteen times the base and snaps back
/// to the base as soon as a pass finds work.
#[derive(Debug, Clone)]
pub struct AdaptiveInterval {
    base: Duration,
    current: Duration,
}

impl AdaptiveInterval {
    /// Create an interval starting at `base`
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: base,
        }
    }

    /// The delay before the next pass
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record the outcome of a pass and return the delay before the next one
    pub fn after_pass(&mut self, found_work: bool) -> Duration {
        if found_work {
            self.current = self.base;
        } else {
            let ceiling = self.base * MAX_INTERVAL_MULTIPLIER;
            self.current = (self.current * 2).min(ceiling);
        }
        self.current
    }
}
