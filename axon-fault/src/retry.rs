//! Retry policy and execution (spec §4.4), grounded on the
//! backoff/jitter/panic-catching shape of a production retry executor in
//! the broader example pack, adapted to a caller-supplied `retry_on`
//! predicate rather than a fixed `is_retryable` method.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::error::FaultError;

/// `(maxAttempts >= 1, backoff, jitter ∈ [0,1])` (spec §4.4). The
/// `retryOn` predicate is supplied per call to [`execute_with_retry`]
/// rather than stored here, since it is a function of the operation's
/// error type, which varies per call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first. Must be `>= 1`.
    pub max_attempts: u32,
    /// Backoff strategy between attempts.
    pub backoff: Backoff,
    /// Jitter fraction in `[0, 1]`; the delay is multiplied by
    /// `1 + uniform(-jitter, +jitter)`, clamped non-negative.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::default(),
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries (single attempt).
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub(crate) fn jittered_delay(&self, attempt: u32) -> std::time::Duration {
        let base = self.backoff.delay_for_attempt(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = rand::thread_rng().gen_range(-jitter..=jitter);
        let millis = (base.as_secs_f64() * (1.0 + factor)).max(0.0);
        std::time::Duration::from_secs_f64(millis)
    }
}

/// Run `op` under `policy`, retrying while `retry_on(&err)` is true and
/// attempts remain. Panics inside `op` are caught (`AssertUnwindSafe` +
/// `catch_unwind`) and treated as a non-retryable final failure, since a
/// panic indicates a programmer error rather than a transient condition.
///
/// `cancellation`, if observed set before an attempt or during a backoff
/// sleep, short-circuits immediately with [`FaultError::Cancelled`]
/// without consuming a retry attempt — per spec §4.4, a cooperative
/// cancellation signal is never retried.
pub async fn execute_with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    cancellation: &CancellationToken,
    retry_on: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, FaultError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        if cancellation.is_cancelled() {
            return Err(FaultError::Cancelled);
        }
        attempt += 1;

        let outcome = AssertUnwindSafe(op()).catch_unwind().await;
        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                return Err(FaultError::Panicked(message));
            }
        };

        if attempt >= policy.max_attempts || !retry_on(&err) {
            if attempt >= policy.max_attempts {
                return Err(FaultError::RetryExhausted {
                    attempts: attempt,
                    source: err,
                });
            }
            return Err(FaultError::Operation(err));
        }

        let delay = policy.jittered_delay(attempt);
        tracing::debug!(attempt, ?delay, "retrying after failure");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancellation.cancelled() => return Err(FaultError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Backoff::Fixed(Duration::from_millis(1)),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<&str, FaultError<&str>> = execute_with_retry(
            &policy(3),
            &cancel,
            |_| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("transient")
                    } else {
                        Ok("ok")
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let cancel = CancellationToken::new();
        let result: Result<(), FaultError<&str>> =
            execute_with_retry(&policy(2), &cancel, |_| true, || async { Err("nope") }).await;
        assert!(matches!(
            result,
            Err(FaultError::RetryExhausted { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn non_retryable_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<(), FaultError<&str>> = execute_with_retry(
            &policy(5),
            &cancel,
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
        )
        .await;
        assert!(matches!(result, Err(FaultError::Operation("fatal"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_retry() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), FaultError<&str>> =
            execute_with_retry(&policy(5), &cancel, |_| true, || async { Err("x") }).await;
        assert!(matches!(result, Err(FaultError::Cancelled)));
    }

    #[tokio::test]
    async fn panic_is_caught_and_not_retried() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<(), FaultError<&str>> = execute_with_retry(
            &policy(5),
            &cancel,
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { panic!("boom") }
            },
        )
        .await;
        assert!(matches!(result, Err(FaultError::Panicked(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
