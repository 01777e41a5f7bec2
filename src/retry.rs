use std::future::Future;
use std::time::Duration;

/// Retry schedule for remote per-asset calls.
///
/// `attempts` is the total number of tries (3 = one initial try plus two
/// retries). The delay before retry `n` is `backoff_factor * 2^n`, so the
/// defaults wait 1s and then 2s.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff_factor: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_factor: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_factor
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

/// Retry an async operation with exponential backoff.
///
/// Returns the first `Ok` result, or the last error once attempts are
/// exhausted. The schedule is deterministic; every error is treated as
/// retryable because the caller aborts the whole run when this returns `Err`.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let total_attempts = config.attempts.max(1);
    let mut last_err: Option<E> = None;

    for attempt in 0..total_attempts {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                let is_last = attempt + 1 >= total_attempts;
                if is_last {
                    last_err = Some(e);
                    break;
                }
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    "Attempt {}/{} failed, retrying in {}s: {}",
                    attempt + 1,
                    total_attempts,
                    delay.as_secs(),
                    e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_err.expect("loop must have run at least once"))
}
