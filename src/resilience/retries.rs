//! Retry logic.
//!
//! # Responsibilities
//! - Run a fallible async operation up to a fixed number of attempts
//! - Sleep with jittered exponential backoff between attempts
//! - Surface the last error once attempts are exhausted

use std::future::Future;

use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Retry `operation` according to `policy`, logging each failed attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    what: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                tracing::error!(operation = %what, attempt, error = %e, "Giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = calculate_backoff(attempt, policy.base_delay_ms, policy.max_delay_ms);
                tracing::warn!(
                    operation = %what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
