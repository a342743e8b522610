//! Bounded exponential backoff shared by the network-facing pipeline stages.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use super::types::CancellationFlag;

/// Retry policy applied to embedding and index-write requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before a failure becomes permanent.
    pub max_attempts: usize,
    /// Delay before the first retry; later delays grow from this floor.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay preceding the given retry, 1-based.
    pub fn delay_for(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        self.base_delay.mul_f64(self.multiplier.powi(exponent))
    }
}

/// Errors that can tell a retryable failure from a terminal one.
pub(crate) trait Retryable: Display {
    /// Whether a retry with backoff can plausibly succeed.
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::embedding::EmbeddingClientError {
    fn is_retryable(&self) -> bool {
        crate::embedding::EmbeddingClientError::is_retryable(self)
    }
}

impl Retryable for crate::qdrant::QdrantError {
    fn is_retryable(&self) -> bool {
        crate::qdrant::QdrantError::is_retryable(self)
    }
}

/// Run `operation` until it succeeds, a terminal error occurs, or the attempt
/// budget is exhausted.
///
/// Cancellation stops further attempts without interrupting the one already
/// in flight; the current error is then returned as the terminal failure.
pub(crate) async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationFlag,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error)
                if error.is_retryable()
                    && attempt < policy.max_attempts
                    && !cancel.is_cancelled() =>
            {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure; backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
