//! Memory tools bound to a session (spec §4.1 step 3: "memory tools bound
//! to `sessionId`, if memory present and `includeMemoryTools`").

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axon_memory::Memory;
use axon_tool::{ToolDyn, ToolResult};
use axon_types::SessionId;
use serde_json::json;

struct CoreMemoryAppend {
    memory: Arc<dyn Memory>,
}

impl ToolDyn for CoreMemoryAppend {
    fn name(&self) -> &str {
        "core_memory_append"
    }

    fn description(&self) -> &str {
        "Append or overwrite a key in a named core memory block."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "block": {"type": "string"},
                "key": {"type": "string"},
                "value": {"type": "string"},
            },
            "required": ["block", "key", "value"],
        })
    }

    fn call(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let (block, key, value) = match extract_three(&args, "block", "key", "value") {
                Ok(triple) => triple,
                Err(message) => return ToolResult::failure(message),
            };
            match self.memory.update_block(&block, &key, &value).await {
                Ok(()) => ToolResult::success(format!("Updated {block}.{key}")),
                Err(err) => ToolResult::failure(err.to_string()),
            }
        })
    }
}

struct ArchivalMemoryInsert {
    memory: Arc<dyn Memory>,
}

impl ToolDyn for ArchivalMemoryInsert {
    fn name(&self) -> &str {
        "archival_memory_insert"
    }

    fn description(&self) -> &str {
        "Store content in long-term archival memory."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {"content": {"type": "string"}},
            "required": ["content"],
        })
    }

    fn call(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let content = match args.get("content").and_then(|v| v.as_str()) {
                Some(content) => content.to_string(),
                None => return ToolResult::failure("missing required argument 'content'"),
            };
            let entry = self.memory.archive(content, Default::default()).await;
            ToolResult::success(format!("Archived as {}", entry.id))
        })
    }
}

struct ArchivalMemorySearch {
    memory: Arc<dyn Memory>,
}

impl ToolDyn for ArchivalMemorySearch {
    fn name(&self) -> &str {
        "archival_memory_search"
    }

    fn description(&self) -> &str {
        "Search long-term archival memory by substring."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": "integer"},
            },
            "required": ["query"],
        })
    }

    fn call(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let limit = args
                .get("limit")
                .and_then(|v| v.as_u64())
                .unwrap_or(10)
                .clamp(1, 100) as usize;
            let entries = self.memory.search_archive(query, limit).await;
            let output = entries
                .iter()
                .map(|entry| entry.content.clone())
                .collect::<Vec<_>>()
                .join("\n");
            ToolResult::success_with_data(output, json!({"count": entries.len()}))
        })
    }
}

struct ConversationSearch {
    memory: Arc<dyn Memory>,
    session_id: SessionId,
}

impl ToolDyn for ConversationSearch {
    fn name(&self) -> &str {
        "conversation_search"
    }

    fn description(&self) -> &str {
        "Search this session's conversation history by substring."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": "integer"},
            },
            "required": ["query"],
        })
    }

    fn call(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let limit = args
                .get("limit")
                .and_then(|v| v.as_u64())
                .unwrap_or(10)
                .clamp(1, 100) as usize;
            let messages = self.memory.search_history(&self.session_id, query, limit).await;
            let output = messages
                .iter()
                .filter_map(|m| m.content())
                .collect::<Vec<_>>()
                .join("\n");
            ToolResult::success(output)
        })
    }
}

fn extract_three(
    args: &serde_json::Value,
    a: &str,
    b: &str,
    c: &str,
) -> Result<(String, String, String), String> {
    let get = |key: &str| -> Result<String, String> {
        args.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| format!("missing required argument '{key}'"))
    };
    Ok((get(a)?, get(b)?, get(c)?))
}

/// Build the fixed set of memory tools bound to one session, per spec
/// §4.1's "memory tools bound to `sessionId`" clause.
pub(crate) fn memory_tools(memory: Arc<dyn Memory>, session_id: SessionId) -> Vec<Arc<dyn ToolDyn>> {
    vec![
        Arc::new(CoreMemoryAppend { memory: memory.clone() }),
        Arc::new(ArchivalMemoryInsert { memory: memory.clone() }),
        Arc::new(ArchivalMemorySearch { memory: memory.clone() }),
        Arc::new(ConversationSearch { memory, session_id }),
    ]
}
