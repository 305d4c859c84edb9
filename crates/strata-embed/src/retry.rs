//! Timeout and exponential-backoff wrapper around [`Embedder`] calls.

use std::time::Duration;

use crate::error::EmbedError;
use crate::provider::Embedder;

/// Bounds for a retried external call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before giving up (default: 3).
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled per attempt (default: 200 ms).
    pub base_delay: Duration,
    /// Per-attempt deadline (default: 30 s).
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay applied before the given (1-based) attempt.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_delay * 2_u32.saturating_pow(attempt - 2)
    }
}

/// Embed `text`, retrying transient failures under the given policy.
///
/// Each attempt is bounded by `policy.timeout`; failed attempts back off
/// exponentially starting from `policy.base_delay`.
///
/// # Errors
///
/// Returns the last attempt's error once `policy.max_attempts` is exhausted.
pub async fn embed_with_retry(
    embedder: &dyn Embedder,
    text: &str,
    policy: &RetryPolicy,
) -> Result<Vec<f32>, EmbedError> {
    let mut last = EmbedError::Unavailable;

    for attempt in 1..=policy.max_attempts.max(1) {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(policy.timeout, embedder.embed(text)).await {
            Ok(Ok(vector)) => return Ok(vector),
            Ok(Err(e)) => {
                tracing::warn!(provider = embedder.name(), attempt, "embedding failed: {e}");
                last = e;
            }
            Err(_) => {
                tracing::warn!(provider = embedder.name(), attempt, "embedding timed out");
                last = EmbedError::Timeout;
            }
        }
    }

    Err(last)
}
