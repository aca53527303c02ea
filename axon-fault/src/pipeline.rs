//! `FaultTolerance = (retry?, circuitBreaker?, operationTimeout?)` (spec
//! §4.4): the composed pipeline, outermost to innermost
//! `operationTimeout -> circuitBreaker -> retry -> operation`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::breaker::CircuitBreaker;
use crate::error::FaultError;
use crate::retry::RetryPolicy;
use crate::timeout::OperationTimeout;

/// Composable retry + circuit breaker + timeout wrapper around any
/// suspendable call. `FaultTolerance::passthrough()` is the all-null
/// identity (spec §4.4).
#[derive(Clone, Default)]
pub struct FaultTolerance {
    retry: Option<RetryPolicy>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    timeout: Option<OperationTimeout>,
}

impl FaultTolerance {
    /// The identity pipeline: no retry, no breaker, no timeout.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Attach a retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Attach a circuit breaker, shared across calls through this pipeline.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Attach an operation timeout bounding the entire retry sequence.
    pub fn with_timeout(mut self, timeout: OperationTimeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `op` through the configured pipeline.
    ///
    /// The timeout (if any) bounds the entire retry sequence, not a single
    /// attempt. The breaker (if any) is consulted before every attempt,
    /// including retries, and can short-circuit before `op` ever runs.
    /// `retry_on` decides, on each operation failure, whether another
    /// attempt should be made.
    pub async fn execute<F, Fut, T, E>(
        &self,
        cancellation: &CancellationToken,
        retry_on: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, FaultError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let body = self.run_retry_loop(cancellation, retry_on, &mut op);

        match &self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout.duration(), body).await {
                Ok(result) => result,
                Err(_elapsed) => Err(FaultError::OperationTimeout {
                    duration: timeout.duration(),
                }),
            },
            None => body.await,
        }
    }

    async fn run_retry_loop<F, Fut, T, E>(
        &self,
        cancellation: &CancellationToken,
        retry_on: impl Fn(&E) -> bool,
        op: &mut F,
    ) -> Result<T, FaultError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.retry.map(|r| r.max_attempts).unwrap_or(1).max(1);
        let mut attempt = 0u32;

        loop {
            if cancellation.is_cancelled() {
                return Err(FaultError::Cancelled);
            }
            attempt += 1;

            if let Some(breaker) = &self.circuit_breaker {
                if breaker.is_open() {
                    return Err(FaultError::CircuitBreakerOpen);
                }
            }

            let outcome = AssertUnwindSafe(op()).catch_unwind().await;
            let err = match outcome {
                Ok(Ok(value)) => {
                    if let Some(breaker) = &self.circuit_breaker {
                        breaker.record_success();
                    }
                    return Ok(value);
                }
                Ok(Err(err)) => {
                    if let Some(breaker) = &self.circuit_breaker {
                        breaker.record_failure();
                    }
                    err
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    return Err(FaultError::Panicked(message));
                }
            };

            let can_retry = self.retry.is_some() && attempt < max_attempts && retry_on(&err);
            if !can_retry {
                if self.retry.is_some() && attempt >= max_attempts && retry_on(&err) {
                    return Err(FaultError::RetryExhausted {
                        attempts: attempt,
                        source: err,
                    });
                }
                return Err(FaultError::Operation(err));
            }

            let delay = self.retry.expect("checked above").jittered_delay(attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancellation.cancelled() => return Err(FaultError::Cancelled),
            }
        }
    }
}
