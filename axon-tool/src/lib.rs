#![deny(missing_docs)]
//! Tool interface and registry (spec §6, component E).
//!
//! Defines [`ToolDyn`] for object-safe tool abstraction and [`ToolRegistry`]
//! for managing a named, typed callable surface. Tool exceptions are never
//! allowed to cross the trait boundary as Rust panics — the registry's
//! [`ToolRegistry::call`] catches them and converts to [`ToolResult::failure`]
//! per spec §9's "Exception-as-control-flow in tool executors" note.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from tool registry operations (registration/introspection, not
/// execution outcomes — those are carried by [`ToolResult`]).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Catch-all for other registry-level errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The outcome of one tool execution (spec §6: `ToolResult = success|failure
/// + output:string + data?:any`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully.
    pub success: bool,
    /// Human/model-readable output text.
    pub output: String,
    /// Optional structured payload alongside `output`.
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result with text output.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
        }
    }

    /// A successful result with text output and a structured payload.
    pub fn success_with_data(output: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: Some(data),
        }
    }

    /// A failed result; `output` carries the error text that is appended
    /// to the conversation as the `Tool` message content.
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            data: None,
        }
    }
}

/// Object-safe trait for tool implementations.
///
/// Any tool source (local function, MCP server, HTTP endpoint) implements
/// this trait. Tools are stored as `Arc<dyn ToolDyn>` in [`ToolRegistry`].
/// Parameters are declared as JSON Schema (spec §6: "the core emits the
/// JSON Schema to the model unchanged").
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    fn call(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>>;
}

/// Registry of tools available to an agent run.
///
/// Holds tools as `Arc<dyn ToolDyn>` keyed by name. The agent loop looks
/// tools up here by name and dispatches through [`ToolRegistry::call`].
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name without executing it.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Iterate over all registered tools, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up and execute a tool by name, catching a panic from the tool
    /// body and converting it into `ToolResult::failure`. Returns
    /// `Err(ToolError::NotFound)` if no tool is registered under `name` —
    /// callers (the agent loop) turn that into the spec's
    /// `"Unknown tool: <name>"` message, not a step failure.
    pub async fn call(&self, name: &str, args: serde_json::Value) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?
            .clone();
        let result = AssertUnwindSafe(tool.call(args)).catch_unwind().await;
        Ok(result.unwrap_or_else(|_| ToolResult::failure(format!("tool '{name}' panicked"))))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn tool_dyn_is_object_safe() {
        _assert_send_sync::<Arc<dyn ToolDyn>>();
    }

    struct EchoTool;

    impl ToolDyn for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input back"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn call(
            &self,
            args: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
            Box::pin(async move { ToolResult::success_with_data("ok", json!({"echoed": args})) })
        }
    }

    struct PanicTool;

    impl ToolDyn for PanicTool {
        fn name(&self) -> &str {
            "panics"
        }
        fn description(&self) -> &str {
            "Always panics"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn call(
            &self,
            _args: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
            Box::pin(async { panic!("boom") })
        }
    }

    #[test]
    fn registry_add_and_get() {
        let mut reg = ToolRegistry::new();
        assert!(reg.is_empty());
        reg.register(Arc::new(EchoTool));
        assert_eq!(reg.len(), 1);
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nonexistent").is_none());
    }

    #[test]
    fn registry_overwrite() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        reg.register(Arc::new(EchoTool));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn call_unknown_tool_is_not_found() {
        let reg = ToolRegistry::new();
        let err = reg.call("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn call_executes_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let result = reg.call("echo", json!({"msg": "hi"})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data, Some(json!({"echoed": {"msg": "hi"}})));
    }

    #[tokio::test]
    async fn call_catches_panic_as_failure() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(PanicTool));
        let result = reg.call("panics", json!({})).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("panicked"));
    }
}
