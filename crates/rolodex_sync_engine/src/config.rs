//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server base URL (no trailing slash).
    pub base_url: String,
    /// Maximum number of outbox items per push batch.
    pub batch_size: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// Backoff policy advertised to the caller's retry scheduler.
    pub backoff: BackoffPolicy,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            batch_size: 20,
            timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Sets the push batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Exponential backoff parameters for retryable failures.
///
/// The engine never sleeps; it reports each failure's retryability and
/// leaves scheduling to the caller, which reads delays from here.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied per subsequent retry.
    pub multiplier: f64,
    /// Upper bound on the computed delay.
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// Creates a policy from its three parameters.
    pub fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    /// Calculates the delay before retry `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://sync.example.com")
            .with_batch_size(5)
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.base_url, "https://sync.example.com");
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn default_batch_size() {
        assert_eq!(SyncConfig::default().batch_size, 20);
    }

    #[test]
    fn backoff_delay_grows_exponentially() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), 2.0, Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn backoff_delay_respects_max() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), 10.0, Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(5));
    }
}
