//! Circuit breaker (spec §4.4): no teacher or pack repo implements one, so
//! this is built directly to the spec's state machine, with the mutex-
//! protected transitions spec §9 explicitly calls for ("Concurrent state
//! in CircuitBreaker").

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::FaultError;

/// `(failureThreshold=5, successThreshold=1, halfOpenAfter=30s)` (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `CLOSED` before tripping to `OPEN`.
    pub failure_threshold: u32,
    /// Consecutive successes in `HALF_OPEN` before returning to `CLOSED`.
    pub success_threshold: u32,
    /// How long `OPEN` must elapse before the next call is allowed through
    /// as a `HALF_OPEN` probe.
    pub half_open_after: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            half_open_after: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RawState {
    Closed,
    Open { tripped_at: Instant },
    HalfOpen,
}

/// The breaker's externally observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through; consecutive failures are counted.
    Closed,
    /// Calls are rejected immediately with [`FaultError::CircuitBreakerOpen`].
    Open,
    /// A probe call is allowed through to test recovery.
    HalfOpen,
}

struct Inner {
    state: RawState,
    failure_count: u32,
    success_count: u32,
}

/// `CLOSED` / `OPEN` / `HALF_OPEN` circuit breaker over any fallible async
/// operation. Shared across concurrent agent runs (spec §5): internally
/// synchronized with a `Mutex`, safe to hold behind an `Arc` and call from
/// many tasks at once.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Build a breaker with the given configuration, starting `CLOSED`.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: RawState::Closed,
                failure_count: 0,
                success_count: 0,
            }),
        }
    }

    /// The breaker's current state. Reading the state is itself the
    /// trigger for the lazy `OPEN -> HALF_OPEN` transition (spec §4.4:
    /// "treat the next read of state as a lazy transition").
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap();
        Self::maybe_transition_to_half_open(&self.config, &mut inner);
        match inner.state {
            RawState::Closed => BreakerState::Closed,
            RawState::Open { .. } => BreakerState::Open,
            RawState::HalfOpen => BreakerState::HalfOpen,
        }
    }

    /// Force the breaker back to `CLOSED` with zero counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = RawState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
    }

    fn maybe_transition_to_half_open(config: &CircuitBreakerConfig, inner: &mut Inner) {
        if let RawState::Open { tripped_at } = inner.state {
            if tripped_at.elapsed() >= config.half_open_after {
                inner.state = RawState::HalfOpen;
                inner.success_count = 0;
            }
        }
    }

    /// Run `op` through the breaker. Rejects immediately with
    /// [`FaultError::CircuitBreakerOpen`] while `OPEN`; otherwise runs the
    /// operation and updates state per spec §4.4's transition table.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, FaultError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut inner = self.inner.lock().unwrap();
            Self::maybe_transition_to_half_open(&self.config, &mut inner);
            if matches!(inner.state, RawState::Open { .. }) {
                return Err(FaultError::CircuitBreakerOpen);
            }
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(FaultError::Operation(err))
            }
        }
    }

    /// `true` if the breaker would currently reject a call (`OPEN` and not
    /// yet eligible for the `HALF_OPEN` probe). Used by the composed
    /// pipeline, which needs to check-then-call as two separate steps
    /// rather than through [`CircuitBreaker::call`]'s single closure.
    pub(crate) fn is_open(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        Self::maybe_transition_to_half_open(&self.config, &mut inner);
        matches!(inner.state, RawState::Open { .. })
    }

    pub(crate) fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            RawState::Closed => inner.failure_count = 0,
            RawState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = RawState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                }
            }
            RawState::Open { .. } => {}
        }
    }

    pub(crate) fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            RawState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = RawState::Open {
                        tripped_at: Instant::now(),
                    };
                }
            }
            RawState::HalfOpen => {
                inner.state = RawState::Open {
                    tripped_at: Instant::now(),
                };
                inner.success_count = 0;
            }
            RawState::Open { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            half_open_after: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn trips_open_after_threshold_failures() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn open_rejects_without_calling_operation() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        let mut called = false;
        let result = breaker
            .call(|| {
                called = true;
                async { Ok::<_, &str>(()) }
            })
            .await;
        assert!(matches!(result, Err(FaultError::CircuitBreakerOpen)));
        assert!(!called);
    }

    #[tokio::test]
    async fn half_open_after_elapsed_and_recovers_on_success() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        let result = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reverts_to_open_and_resets_clock() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        let _ = breaker.call(|| async { Err::<(), _>("still broken") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn success_in_closed_resets_failure_counter() {
        let breaker = CircuitBreaker::new(config());
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        // A further single failure should not trip (threshold is 2 and
        // the counter was reset by the success above).
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn reset_forces_closed_with_zero_counters() {
        let breaker = CircuitBreaker::new(config());
        breaker.reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
