//! Client-side reconciliation of the console event stream.
//!
//! Folds server-pushed console events into an ordered, append-only
//! transcript and tracks which session the client is bound to.
//!
//! # Main types
//!
//! - [`TranscriptStore`]: Ordered entry log with a correlation-id index.
//! - [`SessionBinder`]: Binds and filters by session identity.
//! - [`reduce`]: The pure event transition function.
//! - [`ConsoleState`]: Store, binder and running flag behind one dispatch entry point.

/// Session identity binding.
pub mod binder;
/// Event reconciliation rules.
pub mod reconcile;
/// Combined reconciliation state.
pub mod state;
/// Transcript entry log.
pub mod store;

pub use binder::SessionBinder;
pub use reconcile::{reduce, IgnoreReason, Reduction};
pub use state::{ConsoleState, Ingest};
pub use store::TranscriptStore;
