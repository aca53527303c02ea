//! `InMemoryMemory`: a `HashMap`-behind-`RwLock` implementation of
//! [`Memory`], grounded on the scope-isolation pattern of a `StateStore`
//! in-memory backend. No semantic search; substring matching only.

use std::collections::HashMap;

use async_trait::async_trait;
use axon_types::{Message, SessionId};
use tokio::sync::RwLock;

use crate::archival::ArchivalEntry;
use crate::block::{MemoryBlock, MemoryError};
use crate::memory::Memory;

/// In-process `Memory` implementation. Suitable for single-process use
/// and tests; does not persist across restarts.
#[derive(Default)]
pub struct InMemoryMemory {
    blocks: RwLock<Vec<MemoryBlock>>,
    histories: RwLock<HashMap<SessionId, Vec<Message>>>,
    archive: RwLock<Vec<ArchivalEntry>>,
    sessions_by_user: RwLock<HashMap<String, Vec<SessionId>>>,
}

impl InMemoryMemory {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Memory for InMemoryMemory {
    async fn core_blocks(&self) -> Vec<MemoryBlock> {
        self.blocks.read().await.clone()
    }

    async fn block(&self, name: &str) -> Option<MemoryBlock> {
        self.blocks
            .read()
            .await
            .iter()
            .find(|b| b.name() == name)
            .cloned()
    }

    async fn put_block(&self, block: MemoryBlock) {
        let mut blocks = self.blocks.write().await;
        match blocks.iter_mut().find(|b| b.name() == block.name()) {
            Some(existing) => *existing = block,
            None => blocks.push(block),
        }
    }

    async fn update_block(&self, name: &str, key: &str, value: &str) -> Result<(), MemoryError> {
        let mut blocks = self.blocks.write().await;
        let block = blocks
            .iter_mut()
            .find(|b| b.name() == name)
            .ok_or_else(|| MemoryError::UnknownBlock(name.to_string()))?;
        block.upsert(key, value)
    }

    async fn replace_block(
        &self,
        name: &str,
        content: Vec<(String, String)>,
    ) -> Result<(), MemoryError> {
        let mut blocks = self.blocks.write().await;
        let block = blocks
            .iter_mut()
            .find(|b| b.name() == name)
            .ok_or_else(|| MemoryError::UnknownBlock(name.to_string()))?;
        block.replace(content)
    }

    async fn render_core_memory(&self) -> String {
        let blocks = self.blocks.read().await;
        blocks
            .iter()
            .map(MemoryBlock::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn history(&self, session_id: &SessionId) -> Vec<Message> {
        self.histories
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn add_message(&self, session_id: &SessionId, message: Message) {
        self.histories
            .write()
            .await
            .entry(*session_id)
            .or_default()
            .push(message);
    }

    async fn clear_history(&self, session_id: &SessionId) {
        self.histories.write().await.remove(session_id);
    }

    async fn archive(&self, content: String, metadata: HashMap<String, String>) -> ArchivalEntry {
        let entry = ArchivalEntry::new(content, metadata);
        self.archive.write().await.push(entry.clone());
        entry
    }

    async fn search_archive(&self, query: &str, limit: usize) -> Vec<ArchivalEntry> {
        let archive = self.archive.read().await;
        if query.trim().is_empty() {
            return archive.iter().take(limit).cloned().collect();
        }
        let needle = query.to_lowercase();
        archive
            .iter()
            .filter(|e| e.content.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    async fn search_history(&self, session_id: &SessionId, query: &str, limit: usize) -> Vec<Message> {
        let histories = self.histories.read().await;
        let Some(messages) = histories.get(session_id) else {
            return Vec::new();
        };
        if query.trim().is_empty() {
            return messages.iter().take(limit).cloned().collect();
        }
        let needle = query.to_lowercase();
        messages
            .iter()
            .filter(|m| {
                m.content()
                    .map(|c| c.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    async fn register_session(&self, user_id: &str, session_id: SessionId) {
        let mut sessions = self.sessions_by_user.write().await;
        let entry = sessions.entry(user_id.to_string()).or_default();
        if !entry.contains(&session_id) {
            entry.push(session_id);
        }
    }

    async fn latest_session(&self, user_id: &str) -> Option<SessionId> {
        self.sessions_by_user
            .read()
            .await
            .get(user_id)
            .and_then(|s| s.last().copied())
    }

    async fn sessions(&self, user_id: &str) -> Vec<SessionId> {
        self.sessions_by_user
            .read()
            .await
            .get(user_id)
            .map(|s| s.iter().rev().copied().collect())
            .unwrap_or_default()
    }
}
