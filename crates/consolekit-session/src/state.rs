use crate::binder::SessionBinder;
use crate::reconcile::{reduce, Reduction};
use crate::store::TranscriptStore;
use consolekit_core::{InboundFrame, TranscriptEntry};
use tracing::warn;

/// Result of feeding one inbound frame through [`ConsoleState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    /// The payload could not be parsed and was dropped.
    Malformed,
    /// The frame belongs to a different session and was dropped.
    Rejected {
        /// Session id the frame carried.
        session_id: String,
    },
    /// The frame was accepted and reconciled.
    Applied(Reduction),
}

/// Reconciliation state for one console: transcript, session binding and
/// running flag.
///
/// All inbound traffic goes through [`ConsoleState::ingest_text`] or
/// [`ConsoleState::ingest`]; each call runs to completion before the next.
#[derive(Debug, Default)]
pub struct ConsoleState {
    store: TranscriptStore,
    binder: SessionBinder,
    running: bool,
    completions: u64,
}

impl ConsoleState {
    /// Creates an empty, unbound, idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and reconciles one raw text frame.
    pub fn ingest_text(&mut self, text: &str) -> Ingest {
        match InboundFrame::parse(text) {
            Ok(frame) => self.ingest(&frame),
            Err(e) => {
                warn!(error = %e, "Dropping malformed console event");
                Ingest::Malformed
            }
        }
    }

    /// Reconciles one parsed frame.
    pub fn ingest(&mut self, frame: &InboundFrame) -> Ingest {
        if !self.binder.accept(frame.session_id.as_deref()) {
            return Ingest::Rejected {
                session_id: frame.session_id.clone().unwrap_or_default(),
            };
        }
        let outcome = reduce(&mut self.store, &frame.event);
        if outcome == Reduction::SessionCompleted {
            self.running = false;
            self.completions += 1;
        }
        Ingest::Applied(outcome)
    }

    /// Appends a locally originated entry, such as the user's own message.
    pub fn append_local(&mut self, entry: TranscriptEntry) -> usize {
        self.store.append(entry)
    }

    /// The transcript.
    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// The bound session id.
    pub fn session_id(&self) -> Option<&str> {
        self.binder.bound()
    }

    /// Binds `session_id` unless one is already bound; returns the bound id.
    pub fn bind_session(&mut self, session_id: &str) -> String {
        self.binder.bind(session_id).to_string()
    }

    /// Whether the session is currently running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Sets the running flag.
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Number of completion statuses reconciled so far.
    pub fn completions(&self) -> u64 {
        self.completions
    }

    /// Whether user input must wait for the assistant to finish its turn.
    pub fn is_input_blocked(&self) -> bool {
        self.store.is_streaming()
    }

    /// Unbinds the session and clears the running flag, keeping the
    /// transcript. Later events for the ended session are rejected.
    pub fn end_session(&mut self) {
        self.binder.retire();
        self.running = false;
    }

    /// Clears transcript, binding and running flag.
    pub fn reset(&mut self) {
        self.store.clear();
        self.binder.clear();
        self.running = false;
    }
}
