use async_trait::async_trait;
use consolekit_core::ConsoleResult;
use std::path::PathBuf;

/// Outcome of asking the user for a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorySelection {
    /// The user picked a directory.
    Selected(PathBuf),
    /// The user dismissed the picker.
    Cancelled,
    /// The picker reported a problem.
    Failed(String),
}

/// Directory picker provided by the host environment.
#[async_trait]
pub trait DirectorySelector: Send + Sync {
    /// Asks for a directory.
    async fn select_directory(&self) -> ConsoleResult<DirectorySelection>;
}
