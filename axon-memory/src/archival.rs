//! `ArchivalEntry` (spec §3): searchable, append-only long-term storage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single archived entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivalEntry {
    /// Opaque, unique identifier.
    pub id: String,
    /// The archived content.
    pub content: String,
    /// Caller-supplied metadata.
    pub metadata: HashMap<String, String>,
    /// When the entry was archived.
    pub created_at: DateTime<Utc>,
}

impl ArchivalEntry {
    pub(crate) fn new(content: String, metadata: HashMap<String, String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            content,
            metadata,
            created_at: Utc::now(),
        }
    }
}
