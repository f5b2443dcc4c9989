//! Push interval scheduling.
//!
//! One interval is shared by every log source: a successful push resets it
//! to the configured base, a failed push multiplies it by the backoff factor
//! up to the ceiling. Nothing but the current value is remembered.

use std::time::Duration;

use crate::config::{Config, BACKOFF_FACTOR};

/// Compute the interval that follows `current` given the last push outcome.
///
/// On success the result is always `base_interval`. On failure it is
/// `min(current * factor, max_interval)`.
pub fn next_interval(
    current: u64,
    success: bool,
    base_interval: u64,
    factor: f64,
    max_interval: u64,
) -> u64 {
    if success {
        return base_interval;
    }
    if current >= max_interval {
        return max_interval;
    }
    // f64 -> u64 casts saturate, so an absurd factor still lands on the ceiling.
    let scaled = (current as f64 * factor) as u64;
    scaled.min(max_interval)
}

/// The shared retry state owned by the run loop.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    base_secs: u64,
    max_secs: u64,
    factor: f64,
    current_secs: u64,
}

impl RetrySchedule {
    /// Create a schedule starting at `base`.
    pub fn new(base: Duration, max: Duration, factor: f64) -> Self {
        let base_secs = base.as_secs().max(1);
        Self {
            base_secs,
            max_secs: max.as_secs().max(base_secs),
            factor,
            current_secs: base_secs,
        }
    }

    /// Schedule built from the agent configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.push_interval, config.max_interval, BACKOFF_FACTOR)
    }

    /// Feed a push outcome and return the new interval in seconds.
    pub fn record(&mut self, success: bool) -> u64 {
        self.current_secs = next_interval(
            self.current_secs,
            success,
            self.base_secs,
            self.factor,
            self.max_secs,
        );
        self.current_secs
    }

    /// Seconds to sleep before the next cycle.
    pub fn current_secs(&self) -> u64 {
        self.current_secs
    }

    pub fn base_secs(&self) -> u64 {
        self.base_secs
    }
}
