//! Bounded retry for ledger reads.
//!
//! Only [`LedgerError::Transient`] is retried, with exponential backoff, and
//! only read operations go through this path: a write that times out is
//! ambiguous (it may have landed) and must be reconciled by re-reading, never
//! resubmitted blindly. That rule lives in the services; this module simply
//! refuses to retry anything a ledger has actually evaluated.

use std::time::Duration;
use tokio::time::sleep;

use crate::ledger::LedgerError;

/// Retry schedule for ledger reads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the exponential backoff.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries, for tests and fail-fast callers.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let doubled = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX)));
        doubled.min(self.max_delay)
    }
}

/// Runs a ledger read, retrying transient failures up to the policy's bound.
///
/// # Errors
///
/// Returns the first non-transient error immediately, or the final transient
/// error once retries are exhausted.
pub async fn retry_read<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt, "ledger read succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "transient ledger read failure, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ledger::RejectionReason;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = retry_read(&fast_policy(), || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LedgerError::Transient("connection reset".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejections_are_never_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = retry_read(&fast_policy(), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::Rejected(RejectionReason::AlreadyUsed))
            }
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_transient_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = retry_read(&fast_policy(), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::Transient("still down".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn none_policy_fails_fast() {
        let result: Result<(), _> = retry_read(&RetryPolicy::none(), || async {
            Err(LedgerError::Transient("down".to_string()))
        })
        .await;
        assert!(matches!(result, Err(LedgerError::Transient(_))));
    }
}
