use consolekit_core::{EntryKind, TranscriptEntry};
use std::collections::HashMap;

/// Ordered log of transcript entries.
///
/// Entries are only ever appended; positions never change. Lookups by tool
/// call id go through an index that always points at the most recent entry
/// carrying that id.
#[derive(Debug, Default, Clone)]
pub struct TranscriptStore {
    entries: Vec<TranscriptEntry>,
    by_tool_call: HashMap<String, usize>,
    revision: u64,
}

impl TranscriptStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its position.
    pub fn append(&mut self, entry: TranscriptEntry) -> usize {
        let index = self.entries.len();
        if let Some(call_id) = &entry.tool_call_id {
            self.by_tool_call.insert(call_id.clone(), index);
        }
        self.entries.push(entry);
        self.revision += 1;
        index
    }

    /// All entries in arrival order.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&TranscriptEntry> {
        self.entries.get(index)
    }

    /// The last entry, if any.
    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    /// Position of the most recent entry with the given tool call id.
    pub fn position_of_tool_call(&self, tool_call_id: &str) -> Option<usize> {
        self.by_tool_call.get(tool_call_id).copied()
    }

    /// Extends the open assistant turn at the tail.
    ///
    /// Returns the updated position, or `None` when the tail is not an open
    /// assistant entry.
    pub fn extend_open_assistant(&mut self, chunk: &str, done: bool) -> Option<usize> {
        let index = self.entries.len().checked_sub(1)?;
        let entry = &mut self.entries[index];
        if !entry.is_open_assistant() {
            return None;
        }
        entry.content.push_str(chunk);
        entry.done = Some(done);
        self.revision += 1;
        Some(index)
    }

    /// Resolves the most recent entry for `tool_call_id` into a tool result.
    ///
    /// Returns the updated position, or `None` when no entry carries the id.
    pub fn resolve_tool_call(
        &mut self,
        tool_call_id: &str,
        success: bool,
        result: serde_json::Value,
    ) -> Option<usize> {
        let index = self.position_of_tool_call(tool_call_id)?;
        self.entries[index].resolve_tool(success, result);
        self.revision += 1;
        Some(index)
    }

    /// True while the last entry is an assistant turn that has not finished.
    pub fn is_streaming(&self) -> bool {
        self.last().is_some_and(TranscriptEntry::is_open_assistant)
    }

    /// Number of entries of the given kind.
    pub fn count_kind(&self, kind: EntryKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Counter bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry. The revision keeps counting.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_tool_call.clear();
        self.revision += 1;
    }
}
