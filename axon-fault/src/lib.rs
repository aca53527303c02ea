#![deny(missing_docs)]
//! Retry × CircuitBreaker × Timeout composition (spec §4.4, component B).
//!
//! The three primitives ([`RetryPolicy`]/[`execute_with_retry`],
//! [`CircuitBreaker`], [`OperationTimeout`]) are each usable standalone;
//! [`FaultTolerance`] composes them in the spec's mandated order.

mod backoff;
mod breaker;
mod error;
mod pipeline;
mod retry;
mod timeout;

pub use backoff::{Backoff, DEFAULT_MAX_DELAY};
pub use breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use error::FaultError;
pub use pipeline::FaultTolerance;
pub use retry::{execute_with_retry, RetryPolicy};
pub use timeout::{OperationTimeout, OperationTimeoutConfigError};
