use crate::error::{ConsoleError, ConsoleResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// The `session_status` value that ends a running session.
pub const STATUS_COMPLETED: &str = "completed";

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// Typed payload of a console event, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConsoleEvent {
    /// Server echo of a user message. Carries nothing the client lacks.
    #[serde(rename = "console_user_message")]
    UserMessage {
        /// Echoed text.
        #[serde(default)]
        content: String,
    },

    /// A chunk of streamed assistant output.
    #[serde(rename = "console_assistant_thinking")]
    AssistantThinking {
        /// Text delta.
        #[serde(default)]
        content: String,
        /// Whether this chunk ends the turn.
        #[serde(default)]
        done: bool,
    },

    /// A tool invocation has started.
    #[serde(rename = "console_tool_executing")]
    ToolExecuting {
        /// Name of the tool.
        tool_name: String,
        /// Correlation key for the later result.
        tool_call_id: String,
        /// Tool arguments.
        #[serde(default)]
        parameters: serde_json::Value,
    },

    /// A tool invocation has finished.
    #[serde(rename = "console_tool_result")]
    ToolResult {
        /// Correlation key of the originating call.
        tool_call_id: String,
        /// Whether the tool succeeded.
        #[serde(default)]
        success: bool,
        /// Result payload.
        #[serde(default)]
        content: serde_json::Value,
    },

    /// Session lifecycle status update.
    #[serde(rename = "console_session_status")]
    SessionStatus {
        /// Status string; only [`STATUS_COMPLETED`] has an effect.
        status: String,
    },
}

impl ConsoleEvent {
    /// Wire name of the event type, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UserMessage { .. } => "console_user_message",
            Self::AssistantThinking { .. } => "console_assistant_thinking",
            Self::ToolExecuting { .. } => "console_tool_executing",
            Self::ToolResult { .. } => "console_tool_result",
            Self::SessionStatus { .. } => "console_session_status",
        }
    }
}

/// One JSON object received on the event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Session the event belongs to. Absent (or empty) for system-level events.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    /// The event itself.
    #[serde(flatten)]
    pub event: ConsoleEvent,
}

impl InboundFrame {
    /// Builds a frame that carries no session id.
    pub fn unscoped(event: ConsoleEvent) -> Self {
        Self {
            session_id: None,
            event,
        }
    }

    /// Builds a frame scoped to `session_id`.
    pub fn scoped(session_id: impl Into<String>, event: ConsoleEvent) -> Self {
        Self {
            session_id: Some(session_id.into()),
            event,
        }
    }

    /// Parses one text frame.
    pub fn parse(text: &str) -> ConsoleResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// ---------------------------------------------------------------------------
// Task service bodies
// ---------------------------------------------------------------------------

/// Body of the start request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Initial prompt, with any execution-mode prefix applied.
    pub prompt: String,
    /// Whether the service may run tools without asking.
    pub auto_approve: bool,
    /// Working directory for the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
}

/// Body of a successful start response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    /// Identifier assigned by the service.
    pub session_id: String,
}

/// Body of the continue request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueRequest {
    /// Follow-up message.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Execution mode
// ---------------------------------------------------------------------------

/// How the initial prompt is handed to the task service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Plain agent conversation.
    #[default]
    Agent,
    /// Task executor command.
    Do,
    /// Explorer command.
    Run,
}

impl ExecutionMode {
    /// Applies the mode's command prefix to a prompt.
    pub fn apply(self, prompt: &str) -> String {
        match self {
            Self::Agent => prompt.to_string(),
            Self::Do => format!("/task-mind.do {prompt}"),
            Self::Run => format!("/task-mind.run {prompt}"),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Agent => "agent",
            Self::Do => "do",
            Self::Run => "run",
        };
        f.write_str(name)
    }
}

impl FromStr for ExecutionMode {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "do" => Ok(Self::Do),
            "run" => Ok(Self::Run),
            other => Err(ConsoleError::Config(format!(
                "unknown execution mode '{other}' (expected agent, do or run)"
            ))),
        }
    }
}
