//! Retry Policy
//!
//! Fixed-delay, bounded retry for the producer chain. When computing the
//! feed fails, the driver asks the policy for a delay, sleeps, and restarts
//! the whole chain from scratch. Once the budget is spent the failure
//! becomes terminal for that producer execution.
//!
//! The budget counts consecutive failures: a successfully computed batch
//! resets it.

use std::time::Duration;

/// Retries allowed before a failure becomes terminal.
pub const MAX_RETRIES: u32 = 3;

/// Fixed wait between a failure and the restart.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries allowed before giving up.
    pub max_retries: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay: RETRY_DELAY,
        }
    }
}

impl RetryConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// Bounded fixed-delay retry state for one producer execution.
///
/// # Example
///
/// ```rust
/// use price_stream::infrastructure::retry::{RetryConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let mut policy = RetryPolicy::new(RetryConfig::new(1, Duration::from_secs(2)));
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
/// assert_eq!(policy.next_delay(), None);
///
/// // A successful batch restores the budget.
/// policy.reset();
/// assert!(policy.should_retry());
/// ```
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt_count: u32,
}

impl RetryPolicy {
    /// Create a new retry policy.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Delay before the next retry, or `None` once the budget is spent.
    #[must_use]
    pub const fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count += 1;
        Some(self.config.delay)
    }

    /// Restore the full budget after a successful batch.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Retries consumed since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another retry is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempt_count < self.config.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.delay, Duration::from_secs(2));
    }

    #[test]
    fn delay_is_fixed() {
        let mut policy = RetryPolicy::new(RetryConfig::default());

        assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn budget_is_three_retries() {
        let mut policy = RetryPolicy::new(RetryConfig::default());

        for expected in 1..=3 {
            assert!(policy.next_delay().is_some());
            assert_eq!(policy.attempt_count(), expected);
        }

        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
        assert_eq!(policy.attempt_count(), 3);
    }

    #[test]
    fn reset_restores_budget() {
        let mut policy = RetryPolicy::new(RetryConfig::default());
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert!(policy.should_retry());
        for _ in 0..3 {
            assert!(policy.next_delay().is_some());
        }
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn zero_budget_never_retries() {
        let mut policy = RetryPolicy::new(RetryConfig::new(0, Duration::from_secs(2)));
        assert!(!policy.should_retry());
        assert!(policy.next_delay().is_none());
    }
}
