use crate::store::TranscriptStore;
use consolekit_core::{ConsoleEvent, TranscriptEntry, STATUS_COMPLETED};
use serde::Serialize;
use tracing::debug;

/// What a single [`reduce`] step did to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reduction {
    /// A new entry was appended at this position.
    Appended {
        /// Position of the new entry.
        index: usize,
    },
    /// The entry at this position was mutated in place.
    Updated {
        /// Position of the mutated entry.
        index: usize,
    },
    /// The session reported completion. The store is untouched.
    SessionCompleted,
    /// Nothing changed.
    Ignored {
        /// Why the event had no effect.
        reason: IgnoreReason,
    },
}

impl Reduction {
    /// Whether the step changed the store.
    pub fn touched_store(&self) -> bool {
        matches!(self, Self::Appended { .. } | Self::Updated { .. })
    }

    /// Position of the appended or updated entry.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Appended { index } | Self::Updated { index } => Some(*index),
            _ => None,
        }
    }
}

/// Why an event left the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Echo of a user message that was already appended locally.
    UserEcho,
    /// A final assistant chunk with no open turn to finish.
    TerminalWithoutTurn,
    /// A tool result whose call was never seen.
    OrphanToolResult,
    /// A status other than completion.
    UnhandledStatus,
}

/// Folds one accepted event into the store.
///
/// Every rule here is idempotent with respect to late or unmatched events:
/// anything that cannot be attached is dropped rather than queued.
pub fn reduce(store: &mut TranscriptStore, event: &ConsoleEvent) -> Reduction {
    match event {
        ConsoleEvent::UserMessage { .. } => Reduction::Ignored {
            reason: IgnoreReason::UserEcho,
        },

        ConsoleEvent::AssistantThinking { content, done } => {
            if let Some(index) = store.extend_open_assistant(content, *done) {
                Reduction::Updated { index }
            } else if !*done {
                let index = store.append(TranscriptEntry::assistant(content.clone(), false));
                Reduction::Appended { index }
            } else {
                debug!("Dropping final assistant chunk with no open turn");
                Reduction::Ignored {
                    reason: IgnoreReason::TerminalWithoutTurn,
                }
            }
        }

        ConsoleEvent::ToolExecuting {
            tool_name,
            tool_call_id,
            parameters,
        } => {
            let entry = TranscriptEntry::tool_call(tool_name.clone(), tool_call_id.clone(), parameters);
            Reduction::Appended {
                index: store.append(entry),
            }
        }

        ConsoleEvent::ToolResult {
            tool_call_id,
            success,
            content,
        } => match store.resolve_tool_call(tool_call_id, *success, content.clone()) {
            Some(index) => Reduction::Updated { index },
            None => {
                debug!(tool_call_id = %tool_call_id, "Dropping result for unknown tool call");
                Reduction::Ignored {
                    reason: IgnoreReason::OrphanToolResult,
                }
            }
        },

        ConsoleEvent::SessionStatus { status } if status == STATUS_COMPLETED => {
            Reduction::SessionCompleted
        }
        ConsoleEvent::SessionStatus { status } => {
            debug!(status = %status, "Ignoring session status");
            Reduction::Ignored {
                reason: IgnoreReason::UnhandledStatus,
            }
        }
    }
}
