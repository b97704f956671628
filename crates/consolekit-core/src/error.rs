use thiserror::Error;

/// A convenience `Result` alias using [`ConsoleError`].
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Top-level error type for the console client.
///
/// Reconciliation never produces these for the caller; only lifecycle
/// requests and their preconditions do.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// The task service could not be reached or the transport failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The task service answered with a non-success status.
    #[error("Service error: {status}: {body}")]
    Service {
        /// HTTP status code returned by the service.
        status: u16,
        /// Response body, or a placeholder when it could not be read.
        body: String,
    },

    /// A lifecycle operation was attempted from a phase that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The operation needs a bound session and none is bound.
    #[error("No session is bound")]
    NoSession,

    /// Sending is blocked while the assistant is streaming a turn.
    #[error("Input is blocked while the assistant is streaming")]
    InputBlocked,

    /// Blank input was submitted.
    #[error("Input is empty")]
    EmptyInput,

    /// The console was reset while the request was in flight; its response
    /// was discarded.
    #[error("Request superseded by a console reset")]
    Superseded,

    /// An error from the event channel binding.
    #[error("Channel error: {0}")]
    Channel(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// Whether the error came from talking to the task service, as opposed
    /// to a local precondition.
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Service { .. })
    }
}
