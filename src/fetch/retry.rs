//! Attempt-level retry policy and randomized request pacing.
//!
//! [`RetryPolicy`] decides whether a failed track attempt gets another cycle
//! and how long to wait first. [`Pacing`] inserts a random pause before
//! catalog searches so request timing does not look scripted.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use trackfetch_core::fetch::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(2));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { .. } => unreachable!(),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Default maximum attempts per track.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default waits before attempt 2 and attempt 3 onwards.
pub const DEFAULT_BACKOFF: [Duration; 2] = [Duration::from_secs(2), Duration::from_secs(3)];

/// Decision on whether to start another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Start another attempt after `delay`.
    Retry {
        /// How long to wait first.
        delay: Duration,
        /// The 1-indexed number of the attempt about to start.
        attempt: u32,
    },

    /// Give up on this track.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Bounded attempts with a stepped backoff schedule.
///
/// The wait after attempt `n` is `backoff[n - 1]`, repeating the last entry
/// once the schedule runs out. An empty schedule means no waiting.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    max_attempts: u32,

    /// Waits between consecutive attempts.
    backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Default backoff schedule with a custom attempt bound.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what happens after attempt number `attempt` (1-indexed) failed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay_after(attempt),
            attempt: attempt + 1,
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        let index = usize::try_from(attempt.saturating_sub(1)).unwrap_or(usize::MAX);
        self.backoff
            .get(index)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Uniformly random pause between `min` and `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// Creates a pacing window; bounds are swapped if given out of order.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No pause at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Lower bound of the window.
    #[must_use]
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound of the window.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws a pause length from the window.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn sample(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Sleeps for a sampled pause.
    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis(), "pacing request");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff, DEFAULT_BACKOFF.to_vec());
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(0, Vec::new()).max_attempts(), 1);
    }

    #[test]
    fn test_retry_policy_stepped_backoff() {
        let policy = RetryPolicy::new(5, DEFAULT_BACKOFF.to_vec());
        assert_eq!(
            policy.should_retry(1),
            RetryDecision::Retry {
                delay: Duration::from_secs(2),
                attempt: 2
            }
        );
        assert_eq!(
            policy.should_retry(2),
            RetryDecision::Retry {
                delay: Duration::from_secs(3),
                attempt: 3
            }
        );
        // schedule exhausted: last entry repeats
        assert_eq!(
            policy.should_retry(4),
            RetryDecision::Retry {
                delay: Duration::from_secs(3),
                attempt: 5
            }
        );
    }

    #[test]
    fn test_retry_policy_stops_at_bound() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.should_retry(3),
            RetryDecision::DoNotRetry { .. }
        ));
        assert!(matches!(
            policy.should_retry(10),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_retry_policy_empty_schedule_means_no_wait() {
        let policy = RetryPolicy::new(3, Vec::new());
        assert_eq!(
            policy.should_retry(1),
            RetryDecision::Retry {
                delay: Duration::ZERO,
                attempt: 2
            }
        );
    }

    #[test]
    fn test_pacing_sample_within_window() {
        let pacing = Pacing::new(Duration::from_millis(500), Duration::from_millis(1500));
        for _ in 0..200 {
            let delay = pacing.sample();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_pacing_swaps_reversed_bounds() {
        let pacing = Pacing::new(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(pacing.min(), Duration::from_secs(1));
        assert_eq!(pacing.max(), Duration::from_secs(2));
    }

    #[test]
    fn test_pacing_disabled_is_zero() {
        assert_eq!(Pacing::disabled().sample(), Duration::ZERO);
    }
}
