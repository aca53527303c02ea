//! `MemoryBlock` (spec §3, §4.6): a named, bounded key-value map rendered
//! into the system prompt.

use thiserror::Error;

/// A named, size-bounded key-value block. Entries preserve insertion order
/// so rendering is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    name: String,
    max_size: usize,
    entries: Vec<(String, String)>,
}

/// Mutation of an unknown block, or a mutation that would overflow the
/// block's configured capacity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    /// `update_block`/`replace_block` named a block that was never put.
    #[error("unknown memory block '{0}'")]
    UnknownBlock(String),
    /// The mutation would make the block's rendered content exceed
    /// `max_size` bytes.
    #[error("memory block '{name}' would exceed its {max_size} byte capacity ({attempted} bytes)")]
    CapacityExceeded {
        /// The block's name.
        name: String,
        /// The block's configured capacity, in bytes.
        max_size: usize,
        /// The size the mutation would have produced, in bytes.
        attempted: usize,
    },
}

impl MemoryBlock {
    /// Create an empty block with the given name and byte capacity.
    pub fn new(name: impl Into<String>, max_size: usize) -> Self {
        Self {
            name: name.into(),
            max_size,
            entries: Vec::new(),
        }
    }

    /// The block's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The block's configured byte capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Size, in bytes, of the block's current `key: value` lines.
    pub fn content_size(&self) -> usize {
        self.entries
            .iter()
            .map(|(k, v)| k.len() + ": ".len() + v.len() + "\n".len())
            .sum()
    }

    /// Insert or overwrite a single key, preserving the key's original
    /// position on overwrite. Rejects the mutation if it would overflow
    /// `max_size`.
    pub(crate) fn upsert(&mut self, key: &str, value: &str) -> Result<(), MemoryError> {
        let mut projected = self.entries.clone();
        match projected.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => projected.push((key.to_string(), value.to_string())),
        }
        let projected_size: usize = projected
            .iter()
            .map(|(k, v)| k.len() + ": ".len() + v.len() + "\n".len())
            .sum();
        if projected_size > self.max_size {
            return Err(MemoryError::CapacityExceeded {
                name: self.name.clone(),
                max_size: self.max_size,
                attempted: projected_size,
            });
        }
        self.entries = projected;
        Ok(())
    }

    /// Replace the block's entire content. Rejects the mutation if the
    /// new content would overflow `max_size`.
    pub(crate) fn replace(&mut self, content: Vec<(String, String)>) -> Result<(), MemoryError> {
        let projected_size: usize = content
            .iter()
            .map(|(k, v)| k.len() + ": ".len() + v.len() + "\n".len())
            .sum();
        if projected_size > self.max_size {
            return Err(MemoryError::CapacityExceeded {
                name: self.name.clone(),
                max_size: self.max_size,
                attempted: projected_size,
            });
        }
        self.entries = content;
        Ok(())
    }

    /// Render as `[name]\n` followed by `key: value` lines in insertion
    /// order. No trailing blank line; callers join blocks with one.
    pub fn render(&self) -> String {
        let mut out = format!("[{}]\n", self.name);
        for (k, v) in &self.entries {
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push('\n');
        }
        out
    }
}
