//! Lifecycle and transport side of the console client.
//!
//! Wires the reconciliation state from `consolekit-session` to the outside
//! world: the task service's HTTP API for start/continue/stop, and the
//! WebSocket event channel that streams the session back.
//!
//! # Main types
//!
//! - [`Console`]: Lifecycle controller owning the reconciled state.
//! - [`TaskService`]: Trait for the request/response side of the task service.
//! - [`HttpTaskService`]: `reqwest` implementation of [`TaskService`].
//! - [`EventChannel`]: WebSocket reader feeding [`Console::ingest`].
//! - [`ConsoleConfig`]: TOML configuration.
//! - [`ConsoleUpdate`]: Change notifications for renderers.

/// WebSocket event channel binding.
pub mod channel;
/// Configuration.
pub mod config;
/// Lifecycle controller.
pub mod controller;
/// Directory picker seam.
pub mod directory;
/// Task service client.
pub mod service;
/// Renderer notifications.
pub mod update;

pub use channel::EventChannel;
pub use config::{ConsoleConfig, ServiceConfig, SessionConfig};
pub use controller::{Console, ConsoleOptions};
pub use directory::{DirectorySelection, DirectorySelector};
pub use service::{HttpTaskService, TaskService};
pub use update::{ConsoleUpdate, Notice, NoticeLevel, Phase};
