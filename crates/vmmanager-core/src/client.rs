//! HTTP client settings, retry and task-polling policies.
//!
//! This module provides the timing knobs for reliable communication with the
//! VMmanager API: linear backoff for read paths and the fixed-interval wait used
//! for deferred tasks.

use std::time::Duration;

/// Default timeout for a single HTTP request, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts for retrying read paths
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Default backoff unit in milliseconds; attempt `n` waits `n` units
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;

/// Default interval between task status checks, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default budget for waiting on a deferred task, in seconds
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

/// Status label the service reports for a successfully finished task.
pub const TASK_STATUS_COMPLETE: &str = "complete";

/// Default idle timeout for connection pools, in seconds
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Retry policy with linear backoff.
///
/// After the `n`-th failed attempt the caller sleeps `n × unit` before trying
/// again, so the total wait for `k` failures is `unit × k(k+1)/2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total number of attempts, including the first one. Never below 1.
    pub max_attempts: u32,

    /// Delay unit multiplied by the attempt index
    pub unit: Duration,
}

impl BackoffPolicy {
    /// Create a backoff policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: DEFAULT_FETCH_ATTEMPTS,
            unit: Duration::from_millis(DEFAULT_BACKOFF_UNIT_MS),
        }
    }

    /// Create a policy that performs a single attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            unit: Duration::ZERO,
        }
    }

    /// Set the number of attempts. Values below 1 are raised to 1.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = if attempts == 0 { 1 } else { attempts };
        self
    }

    /// Set the backoff unit.
    #[must_use]
    pub const fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Delay to sleep after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Policy for waiting on a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between status checks
    pub interval: Duration,

    /// Budget after which the wait gives up
    pub timeout: Duration,

    /// Fail immediately when the task reports a status other than `complete`.
    ///
    /// When unset, any non-success status is treated like "not finished yet".
    pub fail_on_terminal_status: bool,
}

impl PollPolicy {
    /// Create a poll policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
            fail_on_terminal_status: false,
        }
    }

    /// Set the interval between status checks.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the wait budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable failing fast on non-success statuses.
    #[must_use]
    pub const fn with_fail_on_terminal_status(mut self, enabled: bool) -> Self {
        self.fail_on_terminal_status = enabled;
        self
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Verify the server's TLS certificate
    pub tls_verify: bool,
}

impl HttpConfig {
    /// Create a transport configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            tls_verify: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_policy_new() {
        let policy = BackoffPolicy::new();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.unit, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_is_linear() {
        let policy = BackoffPolicy::new();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_zero_attempts_clamped() {
        let policy = BackoffPolicy::new().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_backoff_no_retry() {
        let policy = BackoffPolicy::no_retry();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
    }

    #[test]
    fn test_poll_policy_builder() {
        let policy = PollPolicy::new()
            .with_interval(Duration::from_secs(2))
            .with_timeout(Duration::from_secs(60))
            .with_fail_on_terminal_status(true);

        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.timeout, Duration::from_secs(60));
        assert!(policy.fail_on_terminal_status);
    }

    #[test]
    fn test_poll_policy_default() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));
        assert!(!policy.fail_on_terminal_status);
    }

    #[test]
    fn test_http_config_builder() {
        let config = HttpConfig::new()
            .with_timeout(Duration::from_secs(10))
            .with_tls_verify(false);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(!config.tls_verify);
        assert_eq!(config.pool_max_idle_per_host, DEFAULT_POOL_MAX_IDLE_PER_HOST);
    }
}
