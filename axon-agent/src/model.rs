//! `Model` (spec §4.1): the capability contract the agent loop consumes.
//!
//! Uses RPITIT and is intentionally not object-safe — `Agent<M: Model>` is
//! generic over the backend; nothing in this crate needs a `dyn Model`.

use std::future::Future;

use axon_types::{Message, Response};
use futures::Stream;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// JSON Schema description of a tool, as sent to the model.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub parameters: serde_json::Value,
}

/// Errors a model backend can raise.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    /// The request could not be sent or the transport failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The provider rate-limited the request; retryable.
    #[error("rate limited")]
    RateLimited,

    /// Authentication/authorization failed; not retryable.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// The provider's response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all for provider-specific failures.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    /// Whether retrying this particular failure might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::RateLimited | ModelError::RequestFailed(_))
    }
}

/// One event in a streaming completion.
///
/// The stream is a scoped resource: implementations must release the
/// underlying transport on every exit path, including the consumer
/// abandoning iteration before `Done`/`Error` — ordinarily by giving the
/// concrete stream type a `Drop` impl that closes the connection.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text content.
    TextDelta(String),
    /// The model started requesting a tool call.
    ToolCallStart {
        /// Opaque id for this tool call.
        id: String,
        /// Tool name.
        name: String,
    },
    /// Incremental tool-call argument JSON.
    ToolCallDelta {
        /// The tool call this delta belongs to.
        id: String,
        /// Partial, not-yet-valid-JSON argument text.
        partial_arguments: String,
    },
    /// A tool call finished streaming.
    ToolCallComplete(axon_types::ToolCall),
    /// The stream finished normally with the full response.
    Done(Response<()>),
    /// The stream failed.
    Error(String),
}

/// LLM backend capability consumed by the agent loop.
///
/// Each provider (Anthropic, OpenAI, Ollama, a local model) implements
/// this trait. Provider-native features are the implementation's problem;
/// the core sees only `chat`/`chat_typed`/`stream`.
pub trait Model: Send + Sync {
    /// Identifier attached to `MODEL_CALL` span and trace attributes
    /// (e.g. `"claude-opus-4"`, `"gpt-4o"`).
    fn id(&self) -> &str;

    /// Untyped completion: no structured output requested.
    fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
    ) -> impl Future<Output = Result<Response<()>, ModelError>> + Send;

    /// Completion with a requested structured-output shape. The model may
    /// still emit intervening tool calls; only the final, tool-call-free
    /// response carries a parsed value.
    fn chat_typed<T>(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
        schema: &schemars::schema::RootSchema,
    ) -> impl Future<Output = Result<Response<T>, ModelError>> + Send
    where
        T: JsonSchema + DeserializeOwned + Send;

    /// Streaming completion. Callers must fully drain the stream or drop
    /// it promptly; either path releases the transport.
    fn stream(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
    ) -> impl Stream<Item = StreamEvent> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ModelError::RateLimited.is_retryable());
        assert!(ModelError::RequestFailed("timeout".into()).is_retryable());
        assert!(!ModelError::AuthFailed("bad key".into()).is_retryable());
    }
}
