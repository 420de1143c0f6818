//! Retry policy for failed fetch cycles.
//!
//! Attempts are counted per chunk as consecutive failed cycles without
//! progress. A cycle that stages at least one byte resets the count, so a
//! bounded policy only gives up on a path that has stopped delivering.
//!
//! # Policies
//!
//! - [`RetryPolicy::Unbounded`]: retry forever with a fixed delay (default)
//! - [`RetryPolicy::Fixed`]: fixed delay, bounded attempts
//! - [`RetryPolicy::ExponentialBackoff`]: growing delay, bounded attempts

use std::time::Duration;

use crate::config::DEFAULT_RETRY_DELAY_MS;

/// Default initial delay for exponential backoff (100ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Default maximum delay for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// How a chunk worker handles failed cycles.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// Retry forever with a constant delay.
    ///
    /// The remaining range is known and staged progress is durable, so an
    /// unreachable path only delays its own chunk.
    Unbounded {
        /// Delay between attempts.
        delay: Duration,
    },

    /// Constant delay, giving up after `max_attempts` consecutive failures.
    Fixed {
        /// Maximum consecutive failed cycles.
        max_attempts: u32,
        /// Delay between attempts.
        delay: Duration,
    },

    /// Doubling delay, giving up after `max_attempts` consecutive failures.
    ExponentialBackoff {
        /// Maximum consecutive failed cycles.
        max_attempts: u32,
        /// Delay after the first failure.
        initial_delay: Duration,
        /// Delay cap.
        max_delay: Duration,
        /// Multiplier applied after each failure.
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Unbounded {
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Unbounded retries with the given delay.
    pub fn unbounded(delay: Duration) -> Self {
        Self::Unbounded { delay }
    }

    /// Bounded retries with a fixed delay.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Bounded exponential backoff with default delays.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Replace the initial delay of an exponential policy.
    ///
    /// Other policies are returned unchanged.
    pub fn with_initial_delay(self, delay: Duration) -> Self {
        match self {
            Self::ExponentialBackoff {
                max_attempts,
                max_delay,
                multiplier,
                ..
            } => Self::ExponentialBackoff {
                max_attempts,
                initial_delay: delay,
                max_delay: max_delay.max(delay),
                multiplier,
            },
            other => other,
        }
    }

    /// Delay before retrying after `failures` consecutive failed cycles.
    ///
    /// `failures` is 1-based. Returns `None` once the policy gives up.
    pub fn delay_for_attempt(&self, failures: u32) -> Option<Duration> {
        match self {
            Self::Unbounded { delay } => Some(*delay),
            Self::Fixed {
                max_attempts,
                delay,
            } => (failures < *max_attempts).then_some(*delay),
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if failures >= *max_attempts {
                    return None;
                }
                let factor = multiplier.powi(failures.saturating_sub(1) as i32);
                let delay_ms = initial_delay.as_millis() as f64 * factor;
                let capped = delay_ms.min(max_delay.as_millis() as f64) as u64;
                Some(Duration::from_millis(capped))
            }
        }
    }

    /// Maximum consecutive failures, `None` for unbounded.
    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            Self::Unbounded { .. } => None,
            Self::Fixed { max_attempts, .. } => Some(*max_attempts),
            Self::ExponentialBackoff { max_attempts, .. } => Some(*max_attempts),
        }
    }
}
