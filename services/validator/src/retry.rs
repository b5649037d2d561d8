//! Bounded exponential backoff for collaborator calls

use std::future::Future;
use std::time::Duration;

use crate::error::CollaboratorError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Retries back to back. Handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    /// Delay after the `failed`-th attempt: base * 2^(failed-1), capped.
    pub fn delay_for(&self, failed: u32) -> Duration {
        let exp = failed.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
/// `on_retry(attempt, delay, err)` fires before each back-off sleep.
pub async fn retry<T, F, Fut, R>(policy: &RetryPolicy, mut op: F, mut on_retry: R) -> Result<T, CollaboratorError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
    R: FnMut(u32, Duration, &CollaboratorError),
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = policy.delay_for(attempt);
                on_retry(attempt, delay, &e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, CollaboratorError>>,
) -> Result<T, CollaboratorError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| CollaboratorError::Timeout(limit))?
}
