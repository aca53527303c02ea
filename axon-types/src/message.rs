//! `Message` and `ToolCall` (spec §3): the conversational unit threaded
//! through agent state and memory history.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role of a message's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions; synthesized per-run, never stored in history.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Result of a tool execution, addressed back to a specific tool call.
    Tool,
}

/// A request, emitted by the model, to invoke a named tool.
///
/// `id` is opaque to the core; it only needs to round-trip back in the
/// matching `Tool` message (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier assigned by the model provider.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments, as a JSON object.
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    /// Construct a tool call.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single turn in a conversation.
///
/// Invariants (enforced by the constructors below, never by direct field
/// construction since all fields are private):
/// - A `Tool` message always carries `tool_call_id` and `tool_name`.
/// - An `Assistant` message carries content, tool calls, or both.
/// - A `System` message is only ever synthesized per-run; callers
///   constructing one should not persist it to memory history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,
}

impl Message {
    /// Build a `System` message.
    ///
    /// ```
    /// use axon_types::Message;
    /// let m = Message::system("be concise");
    /// assert_eq!(m.content(), Some("be concise"));
    /// ```
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            metadata: HashMap::new(),
        }
    }

    /// Build a `User` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            metadata: HashMap::new(),
        }
    }

    /// Build an `Assistant` message. At least one of `content` or
    /// `tool_calls` must be non-empty; callers that already know the
    /// response shape (plain text or tool use) should prefer
    /// [`Message::assistant_text`] or [`Message::assistant_tool_calls`].
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        debug_assert!(
            content.is_some() || !tool_calls.is_empty(),
            "assistant message must carry content, tool calls, or both"
        );
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            tool_name: None,
            metadata: HashMap::new(),
        }
    }

    /// An `Assistant` message with text content and no tool calls.
    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::assistant(Some(content.into()), Vec::new())
    }

    /// An `Assistant` message requesting tool calls, with no text content.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::assistant(None, tool_calls)
    }

    /// Build a `Tool` message carrying the result of one tool call.
    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            metadata: HashMap::new(),
        }
    }

    /// This message's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Text content, if any.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Tool calls requested by this message (only populated on `Assistant`).
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// The tool-call id this message responds to (only populated on `Tool`).
    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    /// The tool name this message responds to (only populated on `Tool`).
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    /// Opaque metadata, round-tripped verbatim by the core.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Attach metadata, returning the modified message.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_message_carries_id_and_name() {
        let m = Message::tool("tu_1", "get_time", "10:30 AM");
        assert_eq!(m.role(), Role::Tool);
        assert_eq!(m.tool_call_id(), Some("tu_1"));
        assert_eq!(m.tool_name(), Some("get_time"));
    }

    #[test]
    fn assistant_message_with_both_content_and_tool_calls() {
        let call = ToolCall::new("tu_1", "get_time", serde_json::Map::new());
        let m = Message::assistant(Some("checking...".into()), vec![call]);
        assert!(m.content().is_some());
        assert_eq!(m.tool_calls().len(), 1);
    }

    #[test]
    fn serde_roundtrip_preserves_shape() {
        let m = Message::assistant_tool_calls(vec![ToolCall::new(
            "tu_1",
            "bash",
            json!({"command": "ls"}).as_object().unwrap().clone(),
        )]);
        let value = serde_json::to_value(&m).unwrap();
        assert!(value.get("content").is_none(), "None content is omitted");
        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(m, back);
    }
}
