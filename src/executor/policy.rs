//! Retry, backoff and timeout settings for one logical operation.

use std::time::Duration;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of physical attempts when retries are enabled.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base of the exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Upper bound for any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Configuration for retry behavior with exponential backoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Time allowed for each physical attempt.
    pub timeout: Duration,
    /// Whether failed attempts are retried at all.
    pub retry: bool,
    /// Maximum number of physical attempts when `retry` is set.
    pub max_attempts: u32,
    /// Base delay for the backoff.
    pub base_delay: Duration,
    /// Cap applied to every backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::default().with_retry(false)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Number of physical attempts this policy allows, never less than one.
    pub fn attempts(&self) -> u32 {
        if self.retry {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based).
    ///
    /// Computed as `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(31);
        let multiplier = 1u64 << exponent;
        let base_millis = self.base_delay.as_millis() as u64;
        let delay_millis = base_millis.saturating_mul(multiplier);
        let capped_millis = delay_millis.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert!(policy.retry);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1_000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
    }

    #[test]
    fn test_attempts_respects_retry_flag() {
        assert_eq!(RetryPolicy::new().with_max_attempts(5).attempts(), 5);
        assert_eq!(RetryPolicy::no_retry().with_max_attempts(5).attempts(), 1);
    }

    #[test]
    fn test_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::new().with_max_attempts(0).attempts(), 1);
    }

    #[test]
    fn test_delay_exponential_growth() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(8_000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(16_000));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(30_000));
    }

    #[test]
    fn test_builder_pattern() {
        let policy = RetryPolicy::new()
            .with_timeout(Duration::from_secs(5))
            .with_retry(false)
            .with_max_attempts(7)
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(50));

        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert!(!policy.retry);
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(50));
    }
}
