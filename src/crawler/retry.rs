//! Bounded retry with capped exponential backoff
//!
//! The delay before retry `n` (1-based) is `min(base * 2^(n-1), max)`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently a failed operation is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Backoff delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retries are exhausted
///
/// # Arguments
///
/// * `policy` - Retry count and backoff
/// * `label` - Short description used in log lines
/// * `is_retryable` - Classifies an error as transient
/// * `op` - Produces one attempt
///
/// # Returns
///
/// The first success, or the last error seen
pub async fn with_retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let mut retry = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_retryable(&e) || retry >= policy.max_retries {
                    if retry > 0 {
                        tracing::warn!("{} failed after {} retries: {}", label, retry, e);
                    }
                    return Err(e);
                }

                retry += 1;
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    "{} failed (retry {}/{} in {:?}): {}",
                    label,
                    retry,
                    policy.max_retries,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
