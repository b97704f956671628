use serde::Serialize;
use uuid::Uuid;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Something the user asked for went through.
    Success,
    /// Something the user asked for failed.
    Error,
}

/// A short user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Human readable text.
    pub message: String,
}

impl Notice {
    /// Creates a success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// Creates an error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Lifecycle phase of the console, derived from the request in flight and
/// the running flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No request in flight and nothing running.
    Idle,
    /// A start request is in flight.
    Starting,
    /// The session is running.
    Running,
    /// A continue request is in flight.
    Continuing,
    /// A stop request is in flight.
    Stopping,
}

/// Change notifications for renderers.
///
/// Positions refer to the transcript as it is when the update is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleUpdate {
    /// A transcript entry was appended.
    EntryAppended {
        /// Position of the entry.
        index: usize,
        /// Id of the entry, to tell it apart from whatever holds the
        /// position after a reset.
        id: Uuid,
    },
    /// A transcript entry changed in place.
    EntryUpdated {
        /// Position of the entry.
        index: usize,
        /// Id of the entry.
        id: Uuid,
    },
    /// The transcript was cleared.
    Cleared,
    /// A session id was bound.
    SessionBound {
        /// The bound id.
        session_id: String,
    },
    /// The lifecycle phase changed.
    PhaseChanged {
        /// The new phase.
        phase: Phase,
    },
    /// A notification for the user.
    Notice(Notice),
}
