//! Bounded retry with multiplicative backoff

use crate::config::RetryConfig;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Retry policy for master-directed RPCs.
///
/// Only retryable (transport-level) errors are retried. Attempts stop
/// once the next backoff would reach `max_backoff`, or would not grow.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    initial_backoff: Duration,
    multiplier: f64,
    max_backoff: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(initial_backoff: Duration, multiplier: f64, max_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            multiplier,
            max_backoff,
        }
    }

    /// Number of attempts made before giving up on a retryable error
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        let mut attempts = 1;
        let mut wait = self.initial_backoff;
        while let Some(next) = self.next_backoff(wait) {
            wait = next;
            attempts += 1;
        }
        attempts
    }

    /// The wait after `wait`, or `None` once the budget is spent
    fn next_backoff(&self, wait: Duration) -> Option<Duration> {
        let next = Duration::try_from_secs_f64(wait.as_secs_f64() * self.multiplier).ok()?;
        (next > wait && next < self.max_backoff).then_some(next)
    }

    /// Run `job` until it succeeds, fails with a non-retryable error, or
    /// the backoff budget is spent. The last error is returned.
    pub async fn retry<T, F, Fut>(&self, name: &str, mut job: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut wait = self.initial_backoff;
        loop {
            match job().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    let Some(next) = self.next_backoff(wait) else {
                        return Err(e);
                    };
                    info!("retry {}: {}", name, e);
                    tokio::time::sleep(wait).await;
                    wait = next;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            config.backoff_multiplier,
            Duration::from_millis(config.max_backoff_ms),
        )
    }
}
