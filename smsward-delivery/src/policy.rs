//! Retry policy for delivery attempts.
//!
//! Unlike an exponential schedule, the backoff table here is fixed and short:
//! every message is either deliverable within a couple of minutes or parked as
//! failed for the user to act on. All failure causes share the same schedule;
//! the policy does not distinguish transient from permanent failures.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Retry policy configuration for delivery attempts.
///
/// Encapsulates the attempt ceiling and the backoff table so retry behavior
/// can be reasoned about (and tested) independently of the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts before an item is parked as failed.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay table in milliseconds, indexed by the attempt count after a
    /// failure.
    ///
    /// Index 0 is the delay before the very first attempt (immediate); after
    /// a failure that brings the count to `n`, the next attempt waits
    /// `backoff_ms[n]`. If `max_attempts` exceeds the table, the last entry
    /// repeats.
    ///
    /// Default: `[0, 30000, 120000]`
    #[serde(default = "defaults::backoff_ms")]
    pub backoff_ms: Vec<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            backoff_ms: defaults::backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Check if another attempt should be scheduled after `attempts` have
    /// been made.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Check if the next attempt would be the final one.
    #[must_use]
    pub const fn is_final_attempt(&self, attempts: u32) -> bool {
        attempts + 1 >= self.max_attempts
    }

    /// The delay to wait after a failure left the item at `attempts`.
    #[must_use]
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let delay_ms = self
            .backoff_ms
            .get(attempts as usize)
            .or_else(|| self.backoff_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(delay_ms)
    }

    /// When the next attempt may occur, given a failure at `now` that left
    /// the item at `attempts`.
    #[must_use]
    pub fn next_retry(&self, now: SystemTime, attempts: u32) -> SystemTime {
        now + self.delay_after(attempts)
    }
}

mod defaults {
    pub(super) const fn max_attempts() -> u32 {
        3
    }

    pub(super) fn backoff_ms() -> Vec<u64> {
        vec![0, 30_000, 120_000]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_ms, vec![0, 30_000, 120_000]);
    }

    #[test]
    fn should_retry_until_ceiling() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));

        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(100));
    }

    #[test]
    fn backoff_schedule_is_indexed_by_attempt_count() {
        let policy = RetryPolicy::default();

        // First failure leaves the item at 1 attempt: retry 30s later
        assert_eq!(policy.delay_after(1), Duration::from_secs(30));
        // Second failure: retry 120s later
        assert_eq!(policy.delay_after(2), Duration::from_secs(120));
    }

    #[test]
    fn delay_clamps_to_last_entry_beyond_table() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_ms: vec![0, 30_000, 120_000],
        };

        assert_eq!(policy.delay_after(3), Duration::from_secs(120));
        assert_eq!(policy.delay_after(4), Duration::from_secs(120));
    }

    #[test]
    fn empty_table_means_immediate_retry() {
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff_ms: Vec::new(),
        };

        assert_eq!(policy.delay_after(1), Duration::ZERO);
    }

    #[test]
    fn is_final_attempt() {
        let policy = RetryPolicy::default();

        assert!(!policy.is_final_attempt(0));
        assert!(!policy.is_final_attempt(1));
        assert!(policy.is_final_attempt(2));
        assert!(policy.is_final_attempt(3));
    }

    #[test]
    fn next_retry_is_offset_from_failure_time() {
        let policy = RetryPolicy::default();
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);

        assert_eq!(
            policy.next_retry(now, 1),
            now + Duration::from_secs(30),
        );
    }
}
