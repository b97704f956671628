use crate::config::ConsoleConfig;
use crate::directory::{DirectorySelection, DirectorySelector};
use crate::service::TaskService;
use crate::update::{ConsoleUpdate, Notice, Phase};
use consolekit_core::{
    ConsoleError, ConsoleResult, ContinueRequest, ExecutionMode, StartRequest, TranscriptEntry,
};
use consolekit_session::{ConsoleState, Ingest, Reduction};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Options that shape the next session. Locked while a session is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleOptions {
    /// Prefix applied to the initial prompt.
    pub execution_mode: ExecutionMode,
    /// Working directory handed to the service.
    pub project_path: Option<PathBuf>,
    /// Let the service run tools without confirmation.
    pub auto_approve: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Agent,
            project_path: None,
            auto_approve: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Start,
    Continue,
    Stop,
}

#[derive(Debug, Default)]
struct Inner {
    state: ConsoleState,
    in_flight: Option<Request>,
    epoch: u64,
    options: ConsoleOptions,
}

impl Inner {
    fn phase(&self) -> Phase {
        match self.in_flight {
            Some(Request::Start) => Phase::Starting,
            Some(Request::Continue) => Phase::Continuing,
            Some(Request::Stop) => Phase::Stopping,
            None if self.state.is_running() => Phase::Running,
            None => Phase::Idle,
        }
    }
}

/// Captured when a request is issued, checked when its response lands.
struct Ticket {
    epoch: u64,
    completions: u64,
}

/// Drives session lifecycle and owns the reconciled console state.
///
/// Share it behind an [`Arc`]: the event channel calls [`Console::ingest`]
/// while lifecycle calls await the task service. The state lock is never
/// held across an `.await`, so inbound events keep flowing while a request
/// is pending.
pub struct Console {
    inner: Mutex<Inner>,
    service: Arc<dyn TaskService>,
    updates: broadcast::Sender<ConsoleUpdate>,
}

impl Console {
    /// Creates an idle console with default options.
    pub fn new(service: Arc<dyn TaskService>) -> Self {
        Self::with_options(service, ConsoleOptions::default(), 256)
    }

    /// Creates an idle console from configuration.
    pub fn from_config(service: Arc<dyn TaskService>, config: &ConsoleConfig) -> Self {
        let options = ConsoleOptions {
            execution_mode: config.session.execution_mode,
            project_path: config.session.project_path.clone(),
            auto_approve: config.session.auto_approve,
        };
        Self::with_options(service, options, config.update_capacity)
    }

    /// Creates an idle console with explicit options and update buffer size.
    pub fn with_options(
        service: Arc<dyn TaskService>,
        options: ConsoleOptions,
        update_capacity: usize,
    ) -> Self {
        let (updates, _) = broadcast::channel(update_capacity.max(1));
        Self {
            inner: Mutex::new(Inner {
                options,
                ..Inner::default()
            }),
            service,
            updates,
        }
    }

    /// Subscribes to transcript, lifecycle and notice updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleUpdate> {
        self.updates.subscribe()
    }

    fn emit(&self, update: ConsoleUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }

    fn notify(&self, notice: Notice) {
        self.emit(ConsoleUpdate::Notice(notice));
    }

    fn emit_entry(&self, inner: &Inner, index: usize, appended: bool) {
        let Some(id) = inner.state.store().get(index).map(|e| e.id) else {
            return;
        };
        self.emit(if appended {
            ConsoleUpdate::EntryAppended { index, id }
        } else {
            ConsoleUpdate::EntryUpdated { index, id }
        });
    }

    fn emit_phase(&self, inner: &Inner) {
        self.emit(ConsoleUpdate::PhaseChanged {
            phase: inner.phase(),
        });
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Feeds one raw event-channel frame through binding and reconciliation.
    pub fn ingest(&self, text: &str) -> Ingest {
        let mut inner = self.inner.lock();
        let was_bound = inner.state.session_id().is_some();
        let phase_before = inner.phase();

        let outcome = inner.state.ingest_text(text);

        if !was_bound {
            if let Some(session_id) = inner.state.session_id() {
                self.emit(ConsoleUpdate::SessionBound {
                    session_id: session_id.to_string(),
                });
            }
        }
        if let Ingest::Applied(reduction) = &outcome {
            match reduction {
                Reduction::Appended { index } => self.emit_entry(&inner, *index, true),
                Reduction::Updated { index } => self.emit_entry(&inner, *index, false),
                Reduction::SessionCompleted => {
                    info!(session_id = ?inner.state.session_id(), "Console session completed");
                }
                Reduction::Ignored { .. } => {}
            }
        }
        if inner.phase() != phase_before {
            self.emit_phase(&inner);
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Submits user input: starts a session when none is bound, otherwise
    /// continues the bound one.
    pub async fn submit(&self, text: &str) -> ConsoleResult<()> {
        let bound = self.inner.lock().state.session_id().is_some();
        if bound {
            self.send(text).await
        } else {
            self.start(text).await.map(|_| ())
        }
    }

    /// Starts a new session with `prompt` and returns the bound session id.
    ///
    /// The user entry is appended before the request is issued and is kept
    /// even if the request fails.
    pub async fn start(&self, prompt: &str) -> ConsoleResult<String> {
        if prompt.trim().is_empty() {
            return Err(ConsoleError::EmptyInput);
        }

        let (request, ticket) = {
            let mut inner = self.inner.lock();
            if inner.in_flight.is_some() || inner.state.is_running() {
                return Err(ConsoleError::InvalidState(format!(
                    "cannot start from phase {:?}",
                    inner.phase()
                )));
            }
            if inner.state.session_id().is_some() {
                return Err(ConsoleError::InvalidState(
                    "a session is already bound; start a new session first".into(),
                ));
            }

            let prompt = inner.options.execution_mode.apply(prompt);
            let index = inner.state.append_local(TranscriptEntry::user(prompt.clone()));
            inner.in_flight = Some(Request::Start);
            self.emit_entry(&inner, index, true);
            self.emit_phase(&inner);

            let request = StartRequest {
                prompt,
                auto_approve: inner.options.auto_approve,
                project_path: inner
                    .options
                    .project_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
            };
            (request, self.ticket(&inner))
        };

        let result = self.service.start_session(&request).await;

        let mut inner = self.inner.lock();
        if inner.epoch != ticket.epoch {
            debug!("Discarding start response for a reset console");
            return Err(ConsoleError::Superseded);
        }
        inner.in_flight = None;

        match result {
            Ok(response) => {
                let was_bound = inner.state.session_id().is_some();
                let bound = inner.state.bind_session(&response.session_id);
                if bound != response.session_id {
                    warn!(
                        bound = %bound,
                        returned = %response.session_id,
                        "Start response disagrees with session bound from events"
                    );
                }
                if !was_bound {
                    self.emit(ConsoleUpdate::SessionBound {
                        session_id: bound.clone(),
                    });
                }
                let completed = inner.state.completions() != ticket.completions;
                inner.state.set_running(!completed);
                info!(session_id = %bound, "Console session started");
                self.emit_phase(&inner);
                self.notify(Notice::success("Console session started"));
                Ok(bound)
            }
            Err(e) => {
                warn!(error = %e, "Failed to start console session");
                self.emit_phase(&inner);
                self.notify(Notice::error("Failed to start console session"));
                Err(e)
            }
        }
    }

    /// Sends a follow-up message to the bound session.
    ///
    /// Refused while the assistant is mid-turn. A failed request leaves the
    /// user entry in place.
    pub async fn send(&self, text: &str) -> ConsoleResult<()> {
        if text.trim().is_empty() {
            return Err(ConsoleError::EmptyInput);
        }

        let (session_id, ticket) = {
            let mut inner = self.inner.lock();
            let session_id = inner
                .state
                .session_id()
                .map(str::to_string)
                .ok_or(ConsoleError::NoSession)?;
            if inner.in_flight.is_some() {
                return Err(ConsoleError::InvalidState(format!(
                    "cannot send from phase {:?}",
                    inner.phase()
                )));
            }
            if inner.state.is_input_blocked() {
                return Err(ConsoleError::InputBlocked);
            }

            let index = inner.state.append_local(TranscriptEntry::user(text));
            inner.in_flight = Some(Request::Continue);
            self.emit_entry(&inner, index, true);
            self.emit_phase(&inner);
            (session_id, self.ticket(&inner))
        };

        let request = ContinueRequest {
            message: text.to_string(),
        };
        let result = self.service.continue_session(&session_id, &request).await;

        let mut inner = self.inner.lock();
        if inner.epoch != ticket.epoch {
            debug!(session_id = %session_id, "Discarding continue response for a reset console");
            return Err(ConsoleError::Superseded);
        }
        inner.in_flight = None;

        match result {
            Ok(()) => {
                let completed = inner.state.completions() != ticket.completions;
                inner.state.set_running(!completed);
                self.emit_phase(&inner);
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to send message");
                self.emit_phase(&inner);
                self.notify(Notice::error("Failed to send message"));
                Err(e)
            }
        }
    }

    /// Stops the bound session and forgets it.
    pub async fn stop(&self) -> ConsoleResult<()> {
        let (session_id, ticket) = {
            let mut inner = self.inner.lock();
            let session_id = inner
                .state
                .session_id()
                .map(str::to_string)
                .ok_or(ConsoleError::NoSession)?;
            if inner.in_flight.is_some() {
                return Err(ConsoleError::InvalidState(format!(
                    "cannot stop from phase {:?}",
                    inner.phase()
                )));
            }
            inner.in_flight = Some(Request::Stop);
            self.emit_phase(&inner);
            (session_id, self.ticket(&inner))
        };

        let result = self.service.stop_session(&session_id).await;

        let mut inner = self.inner.lock();
        if inner.epoch != ticket.epoch {
            debug!(session_id = %session_id, "Discarding stop response for a reset console");
            return Err(ConsoleError::Superseded);
        }
        inner.in_flight = None;

        match result {
            Ok(()) => {
                inner.epoch += 1;
                inner.state.end_session();
                info!(session_id = %session_id, "Console session stopped");
                self.emit_phase(&inner);
                self.notify(Notice::success("Session stopped"));
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to stop session");
                self.emit_phase(&inner);
                self.notify(Notice::error("Failed to stop session"));
                Err(e)
            }
        }
    }

    /// Clears transcript, session binding and running flag. Responses to
    /// requests still in flight are discarded when they arrive.
    pub fn new_session(&self) {
        let mut inner = self.inner.lock();
        inner.state.reset();
        inner.in_flight = None;
        inner.epoch += 1;
        info!(epoch = inner.epoch, "Console reset");
        self.emit(ConsoleUpdate::Cleared);
        self.emit_phase(&inner);
    }

    fn ticket(&self, inner: &Inner) -> Ticket {
        Ticket {
            epoch: inner.epoch,
            completions: inner.state.completions(),
        }
    }

    // -----------------------------------------------------------------------
    // Options
    // -----------------------------------------------------------------------

    fn with_unlocked_options<T>(&self, f: impl FnOnce(&mut ConsoleOptions) -> T) -> ConsoleResult<T> {
        let mut inner = self.inner.lock();
        if inner.state.session_id().is_some() || inner.in_flight.is_some() {
            return Err(ConsoleError::InvalidState(
                "options are locked while a session is active".into(),
            ));
        }
        Ok(f(&mut inner.options))
    }

    /// Sets the execution mode for the next session.
    pub fn set_execution_mode(&self, mode: ExecutionMode) -> ConsoleResult<()> {
        self.with_unlocked_options(|o| o.execution_mode = mode)
    }

    /// Sets the project directory for the next session.
    pub fn set_project_path(&self, path: impl Into<PathBuf>) -> ConsoleResult<()> {
        let path = path.into();
        self.with_unlocked_options(|o| o.project_path = Some(path))
    }

    /// Clears the project directory.
    pub fn clear_project_path(&self) -> ConsoleResult<()> {
        self.with_unlocked_options(|o| o.project_path = None)
    }

    /// Asks `selector` for a project directory and applies the choice.
    ///
    /// Returns the selected path, or `None` when the user cancelled or the
    /// picker reported a problem (which is surfaced as an error notice).
    pub async fn select_directory(
        &self,
        selector: &dyn DirectorySelector,
    ) -> ConsoleResult<Option<PathBuf>> {
        self.with_unlocked_options(|_| ())?;

        match selector.select_directory().await {
            Ok(DirectorySelection::Selected(path)) => {
                self.set_project_path(path.clone())?;
                Ok(Some(path))
            }
            Ok(DirectorySelection::Cancelled) => Ok(None),
            Ok(DirectorySelection::Failed(message)) => {
                let message = if message.is_empty() {
                    "Failed to select directory".to_string()
                } else {
                    message
                };
                self.notify(Notice::error(message));
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Directory selection failed");
                self.notify(Notice::error("Failed to select directory"));
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Copy of the transcript.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.inner.lock().state.store().entries().to_vec()
    }

    /// Copy of the entry at `index`.
    pub fn entry(&self, index: usize) -> Option<TranscriptEntry> {
        self.inner.lock().state.store().get(index).cloned()
    }

    /// The bound session id.
    pub fn session_id(&self) -> Option<String> {
        self.inner.lock().state.session_id().map(str::to_string)
    }

    /// Whether the session is running.
    pub fn is_running(&self) -> bool {
        self.inner.lock().state.is_running()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.inner.lock().phase()
    }

    /// Whether `send` would currently be refused because the assistant is
    /// mid-turn.
    pub fn is_input_blocked(&self) -> bool {
        self.inner.lock().state.is_input_blocked()
    }

    /// Current options.
    pub fn options(&self) -> ConsoleOptions {
        self.inner.lock().options.clone()
    }

    /// Runs `f` against the reconciliation state under the lock.
    pub fn with_state<T>(&self, f: impl FnOnce(&ConsoleState) -> T) -> T {
        f(&self.inner.lock().state)
    }
}
