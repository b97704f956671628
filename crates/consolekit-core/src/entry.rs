use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of a [`TranscriptEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Text typed by the local user.
    User,
    /// Assistant output, possibly still streaming.
    Assistant,
    /// A tool invocation that has not produced a result yet.
    ToolCall,
    /// A tool invocation whose result has arrived.
    ToolResult,
}

/// Execution status carried in the metadata of tool entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// The tool is still running.
    Executing,
    /// The tool finished successfully.
    Success,
    /// The tool reported a failure.
    Error,
}

/// Status/result bag attached to tool entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Current execution status.
    pub status: ToolStatus,
    /// Result payload, once the tool has finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// One line of the conversation or tool trace.
///
/// Entries are append-only: once stored, only `content`, `done`, `metadata`
/// and the `ToolCall -> ToolResult` kind transition may change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Locally generated identifier, stable for the life of the entry.
    pub id: Uuid,
    /// What this entry represents.
    pub kind: EntryKind,
    /// Text payload. For tool entries, the pretty-printed call parameters.
    pub content: String,
    /// Local creation time.
    pub timestamp: DateTime<Utc>,
    /// Tool name, only on tool entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Correlation key joining a tool call to its result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Streaming completion flag, only on assistant entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Tool status and result, only on tool entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntryMetadata>,
}

impl TranscriptEntry {
    fn new(kind: EntryKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            tool_name: None,
            tool_call_id: None,
            done: None,
            metadata: None,
        }
    }

    /// Creates an [`EntryKind::User`] entry.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(EntryKind::User, content)
    }

    /// Creates an [`EntryKind::Assistant`] entry with the given streaming state.
    pub fn assistant(content: impl Into<String>, done: bool) -> Self {
        let mut entry = Self::new(EntryKind::Assistant, content);
        entry.done = Some(done);
        entry
    }

    /// Creates an executing [`EntryKind::ToolCall`] entry.
    ///
    /// The parameters are rendered as two-space indented JSON for display.
    pub fn tool_call(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        parameters: &serde_json::Value,
    ) -> Self {
        let rendered = serde_json::to_string_pretty(parameters).unwrap_or_default();
        let mut entry = Self::new(EntryKind::ToolCall, rendered);
        entry.tool_name = Some(tool_name.into());
        entry.tool_call_id = Some(tool_call_id.into());
        entry.metadata = Some(EntryMetadata {
            status: ToolStatus::Executing,
            result: None,
        });
        entry
    }

    /// True for an assistant entry whose turn is still streaming.
    pub fn is_open_assistant(&self) -> bool {
        self.kind == EntryKind::Assistant && self.done == Some(false)
    }

    /// Current tool status, if this is a tool entry.
    pub fn tool_status(&self) -> Option<ToolStatus> {
        self.metadata.as_ref().map(|m| m.status)
    }

    /// Turns this entry into a finished tool result.
    pub fn resolve_tool(&mut self, success: bool, result: serde_json::Value) {
        self.kind = EntryKind::ToolResult;
        self.metadata = Some(EntryMetadata {
            status: if success {
                ToolStatus::Success
            } else {
                ToolStatus::Error
            },
            result: Some(result),
        });
    }
}
