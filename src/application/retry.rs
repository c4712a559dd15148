use std::future::Future;
use std::time::Duration;

use crate::application::error::AllocationError;

/// Bounded retry for storage contention
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub attempts: u32,
    /// Base delay, multiplied by the attempt number
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempts run out. Each attempt must be a complete transaction so that
/// re-running it is safe.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    name: &str,
    mut operation: F,
) -> Result<T, AllocationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AllocationError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(e) if e.is_retryable() && attempt < policy.attempts => {
                tracing::warn!(
                    "{} hit storage contention (attempt {}/{}): {}",
                    name,
                    attempt,
                    policy.attempts,
                    e
                );
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!("{} gave up after {} attempts: {}", name, attempt, e);
                }
                return Err(e);
            }
            Ok(value) => return Ok(value),
        }
    }
}
