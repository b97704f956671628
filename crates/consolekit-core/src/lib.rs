//! Core types and error definitions for the consolekit console client.
//!
//! This crate provides the foundational types shared across all consolekit
//! crates: the unified error type, the transcript entry model, and the wire
//! format of the console event stream and task service requests.
//!
//! # Main types
//!
//! - [`ConsoleError`]: Unified error enum for all consolekit subsystems.
//! - [`ConsoleResult`]: Convenience alias for `Result<T, ConsoleError>`.
//! - [`TranscriptEntry`]: One line of the conversation or tool trace.
//! - [`EntryKind`]: Closed set of entry kinds (user, assistant, tool call, tool result).
//! - [`InboundFrame`]: One parsed frame from the console event channel.
//! - [`ConsoleEvent`]: The typed payload of an inbound frame.

/// Error types.
pub mod error;
/// Transcript entry model.
pub mod entry;
/// Wire format of the event channel and task service.
pub mod event;

pub use entry::{EntryKind, EntryMetadata, ToolStatus, TranscriptEntry};
pub use error::{ConsoleError, ConsoleResult};
pub use event::{
    ConsoleEvent, ContinueRequest, ExecutionMode, InboundFrame, StartRequest, StartResponse,
    STATUS_COMPLETED,
};
