//! The `Memory` capability (spec §4.6): session-scoped message history,
//! core blocks, and archival search.

use std::collections::HashMap;

use async_trait::async_trait;
use axon_types::{Message, SessionId};

use crate::archival::ArchivalEntry;
use crate::block::{MemoryBlock, MemoryError};

/// Session-scoped message history, core memory blocks, and archival
/// search. Implementations are shared by reference across concurrent
/// agent runs and must be internally safe under concurrent access
/// (spec §5).
#[async_trait]
pub trait Memory: Send + Sync {
    /// All core blocks, in the order they were first put.
    async fn core_blocks(&self) -> Vec<MemoryBlock>;

    /// A single core block by name.
    async fn block(&self, name: &str) -> Option<MemoryBlock>;

    /// Insert a block, or overwrite an existing block with the same name.
    async fn put_block(&self, block: MemoryBlock);

    /// Set a single key in an existing block. Fails if the block is
    /// unknown or the mutation would overflow its capacity.
    async fn update_block(&self, name: &str, key: &str, value: &str) -> Result<(), MemoryError>;

    /// Replace a block's entire content. Fails if the block is unknown or
    /// the new content would overflow its capacity.
    async fn replace_block(
        &self,
        name: &str,
        content: Vec<(String, String)>,
    ) -> Result<(), MemoryError>;

    /// Stable, deterministic rendering of every core block, separated by
    /// a blank line.
    async fn render_core_memory(&self) -> String;

    /// Session message history, in insertion order. Empty for an unknown
    /// session.
    async fn history(&self, session_id: &SessionId) -> Vec<Message>;

    /// Append a message to a session's history.
    async fn add_message(&self, session_id: &SessionId, message: Message);

    /// Clear a session's history.
    async fn clear_history(&self, session_id: &SessionId);

    /// Append an entry to the archive.
    async fn archive(&self, content: String, metadata: HashMap<String, String>) -> ArchivalEntry;

    /// Case-insensitive substring search over archived content. A blank
    /// query returns the first `limit` entries in insertion order.
    async fn search_archive(&self, query: &str, limit: usize) -> Vec<ArchivalEntry>;

    /// Case-insensitive substring search over a session's history.
    /// Messages with no content are skipped.
    async fn search_history(&self, session_id: &SessionId, query: &str, limit: usize) -> Vec<Message>;

    /// Register a session as belonging to a user. Idempotent.
    async fn register_session(&self, user_id: &str, session_id: SessionId);

    /// The most recently registered session for a user, if any.
    async fn latest_session(&self, user_id: &str) -> Option<SessionId>;

    /// All sessions registered for a user, in descending registration
    /// order (most recent first).
    async fn sessions(&self, user_id: &str) -> Vec<SessionId>;
}
