//! Uniform error taxonomy (spec §3, §7): component A.
//!
//! `Result<T>` from the spec's data model is realized directly as
//! [`AgentResult<T>`] = `std::result::Result<T, AgentError>` — Rust's sum
//! type already is the tagged success/failure union the spec describes, so
//! no separate `Success`/`Failure` wrapper is built on top of it.

use thiserror::Error;

/// The result type returned by every fallible core operation.
pub type AgentResult<T> = std::result::Result<T, AgentError>;

/// Errors surfaced across the agent loop and workflow orchestrator.
///
/// Tool and step failures that the spec treats as *data* (`ToolResult`,
/// `StepResult`) are not represented here — they never reach this type.
/// Only the rows of spec §7 that are genuine call failures are.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AgentError {
    /// Input validation failed before any side effect occurred (spec §4.1
    /// "Run loop": `userInput` null/blank, `session` null).
    #[error("{0}")]
    Validation(String),

    /// A step or run failed after catching an error from the model or a
    /// tool at the step boundary (spec §4.1 "Failure semantics").
    #[error("Agent step failed: {0}")]
    StepFailed(String),

    /// A workflow step failed; carries the failing step's name so
    /// `Fallback`/`Sequential` can report which child failed.
    #[error("{name}: {message}")]
    StepFailure {
        /// Name of the step that failed.
        name: String,
        /// Failure detail.
        message: String,
    },

    /// The fault-tolerance pipeline exhausted retries, tripped its
    /// breaker, or elapsed its timeout. Carries the formatted cause from
    /// `axon-fault` rather than a typed dependency, keeping `axon-types`
    /// free of a dependency on the fault-tolerance crate.
    #[error("{0}")]
    FaultTolerance(String),

    /// Catch-all for errors originating outside this taxonomy (e.g. a
    /// model provider's own error type).
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AgentError {
    /// Build a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a step-failed error with the `"Agent step failed: "` prefix
    /// the spec mandates for uncaught model/tool exceptions.
    pub fn step_failed(message: impl Into<String>) -> Self {
        Self::StepFailed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failed_carries_prefix() {
        let err = AgentError::step_failed("boom");
        assert_eq!(err.to_string(), "Agent step failed: boom");
    }

    #[test]
    fn validation_has_no_prefix() {
        let err = AgentError::validation("userInput must not be null or blank");
        assert_eq!(err.to_string(), "userInput must not be null or blank");
    }
}
