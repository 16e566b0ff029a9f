//! Retrying transport with exponential backoff.
//!
//! The caller has no knowledge of what is being requested. It re-issues an
//! operation while the failure is transient and the attempt budget allows,
//! doubling the wait after every retry.

use crate::Error;
use std::future::Future;
use std::time::Duration;

/// HTTP statuses retried regardless of endpoint:
/// unauthorized, rate-limited, server error, service unavailable.
pub const RETRYABLE_STATUSES: [u16; 4] = [401, 429, 500, 503];

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of tries, including the first one.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each later attempt.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Wait before retry number `retry` (1-based): `initial * 2^(retry-1)`.
    ///
    /// Uncapped; saturates instead of overflowing.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }
}

/// Run `call` until it succeeds, fails terminally, or the budget runs out.
///
/// Transient failures (see [`Error::is_retryable`]) are retried after the
/// backoff delay. The last failure is returned once `max_attempts` tries
/// have been made; a terminal failure is returned immediately.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, operation, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_before_retry(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    operation,
                    "request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                if error.is_retryable() {
                    tracing::error!(
                        attempts = attempt,
                        error = %error,
                        operation,
                        "request failed after all retry attempts"
                    );
                } else {
                    tracing::error!(error = %error, operation, "request failed with non-retryable error");
                }
                return Err(error);
            }
        }
    }
}
