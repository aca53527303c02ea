//! `Response<T>` (spec §3): what a model call (or a fully-driven agent run)
//! produces.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::message::ToolCall;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model produced a final answer.
    Stop,
    /// The model requested one or more tool calls.
    ToolCalls,
    /// The response was truncated at the token limit.
    Length,
    /// Output was suppressed by a safety filter.
    ContentFilter,
    /// The call failed.
    Error,
}

/// Token accounting for a single model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens generated by the model.
    pub output_tokens: u64,
    /// Tokens served from a prompt cache, if the provider reports one.
    pub cache_read_tokens: Option<u64>,
    /// Tokens written to a prompt cache, if the provider reports one.
    pub cache_creation_tokens: Option<u64>,
}

/// A model (or fully-driven agent run) response.
///
/// `T` is the structured-output type requested via `OutputSchema<T>`
/// (spec §4.2); `Response<()>` is the untyped shape used when no schema is
/// supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T = ()> {
    /// Raw text content, if any.
    pub content: Option<String>,
    /// The parsed, schema-conforming value, when structured output was
    /// requested and parsing succeeded.
    pub parsed: Option<T>,
    /// Tool calls requested by the model.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Token accounting, if the provider reports it.
    pub usage: Option<TokenUsage>,
    /// Opaque reasoning/thinking trace, if the provider emits one.
    pub thinking: Option<String>,
    /// Citations accompanying the content, in provider-defined shape.
    #[serde(default)]
    pub citations: Vec<serde_json::Value>,
    /// Opaque metadata round-tripped verbatim (e.g. reasoning signatures).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl<T> Response<T> {
    /// `true` exactly when this response requested tool calls (spec §3:
    /// `hasToolCalls ⇔ finishReason = TOOL_CALLS` in well-formed responses).
    pub fn has_tool_calls(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls
    }

    /// Re-tag the parsed payload type, discarding any existing parsed
    /// value. Used when relaying a provider's untyped response into a
    /// typed `Response<T>` shell before structured-output parsing fills it in.
    pub fn retype<U>(self) -> Response<U> {
        Response {
            content: self.content,
            parsed: None,
            tool_calls: self.tool_calls,
            finish_reason: self.finish_reason,
            usage: self.usage,
            thinking: self.thinking,
            citations: self.citations,
            metadata: self.metadata,
        }
    }
}

impl Response<()> {
    /// Build a plain-text, tool-call-free response with `Stop`.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            parsed: None,
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: None,
            thinking: None,
            citations: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Build a tool-call response with `ToolCalls`.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            parsed: None,
            tool_calls: calls,
            finish_reason: FinishReason::ToolCalls,
            usage: None,
            thinking: None,
            citations: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_tool_calls_matches_finish_reason() {
        let r = Response::tool_calls(vec![ToolCall::new("tu_1", "x", serde_json::Map::new())]);
        assert!(r.has_tool_calls());
        let r = Response::text("hi");
        assert!(!r.has_tool_calls());
    }
}
