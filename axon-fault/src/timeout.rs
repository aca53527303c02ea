//! Operation timeout (spec §4.4): bounds the wrapped pipeline on a
//! separate cooperative deadline.

use std::future::Future;
use std::time::Duration;

use crate::error::FaultError;

/// A positive wall-clock deadline wrapped around an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimeout(Duration);

impl OperationTimeout {
    /// Construct a timeout. Zero or negative duration is a construction
    /// -time error per spec §4.4; since [`Duration`] cannot be negative,
    /// only zero is checked.
    pub fn new(duration: Duration) -> Result<Self, OperationTimeoutConfigError> {
        if duration.is_zero() {
            return Err(OperationTimeoutConfigError::NonPositiveDuration);
        }
        Ok(Self(duration))
    }

    /// The configured deadline.
    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Run `fut` under this deadline. On elapse, interrupts by dropping
    /// the in-flight future and raises [`FaultError::OperationTimeout`].
    pub async fn run<Fut, T, E>(&self, fut: Fut) -> Result<T, FaultError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.0, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(FaultError::Operation(err)),
            Err(_elapsed) => Err(FaultError::OperationTimeout { duration: self.0 }),
        }
    }
}

/// Construction-time error for an invalid [`OperationTimeout`].
#[derive(Debug, thiserror::Error)]
pub enum OperationTimeoutConfigError {
    /// The supplied duration was zero.
    #[error("operation timeout duration must be positive")]
    NonPositiveDuration,
}
