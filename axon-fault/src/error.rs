//! Error surface for the fault-tolerance pipeline (spec §4.4, §7).

use std::time::Duration;
use thiserror::Error;

/// Errors raised by [`crate::FaultTolerance::execute`] and its components.
///
/// `E` is the wrapped operation's own error type. Per spec §4.4: "Exception
/// -typed failures from the operation are propagated as-is when unwrapped";
/// retry wraps exhaustion, the breaker emits its own variant, and the
/// timeout emits its own variant.
#[derive(Debug, Error)]
pub enum FaultError<E> {
    /// The operation failed and was not retried (either no retry policy
    /// was configured, or the failure was judged non-retryable).
    #[error(transparent)]
    Operation(E),

    /// The circuit breaker is open and rejected the call without
    /// attempting the operation.
    #[error("circuit breaker is open")]
    CircuitBreakerOpen,

    /// Every retry attempt failed.
    #[error("retry exhausted after {attempts} attempt(s): {source}")]
    RetryExhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The last attempt's error.
        #[source]
        source: E,
    },

    /// The operation did not complete within its configured deadline.
    #[error("operation timed out after {duration:?}")]
    OperationTimeout {
        /// The configured deadline.
        duration: Duration,
    },

    /// A cooperative cancellation signal was observed; the cancellation
    /// flag is preserved by propagating this variant immediately rather
    /// than retrying (spec §4.4: `InterruptedError` is never retried).
    #[error("operation cancelled")]
    Cancelled,

    /// The operation panicked. Treated as a non-retryable programmer
    /// error rather than a transient failure.
    #[error("operation panicked: {0}")]
    Panicked(String),
}

impl<E> FaultError<E> {
    /// `true` for the variants the breaker itself raised rather than the
    /// wrapped operation.
    pub fn is_circuit_breaker_open(&self) -> bool {
        matches!(self, Self::CircuitBreakerOpen)
    }

    /// `true` if this is a timeout raised by the pipeline itself.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::OperationTimeout { .. })
    }
}
