use tracing::{debug, trace};

/// Tracks the session the client is bound to and filters inbound events.
///
/// The first event carrying a session id binds it when nothing is bound yet,
/// so the client does not need the start response before streaming begins.
/// A stopped session is remembered as retired so its trailing events cannot
/// bind it again.
#[derive(Debug, Default, Clone)]
pub struct SessionBinder {
    bound: Option<String>,
    retired: Option<String>,
}

impl SessionBinder {
    /// Creates an unbound binder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether an event with the given session id belongs to us.
    ///
    /// Binds `session_id` as a side effect when nothing is bound and the id
    /// is not the retired one.
    pub fn accept(&mut self, session_id: Option<&str>) -> bool {
        let Some(incoming) = session_id else {
            return true;
        };
        if self.retired.as_deref() == Some(incoming) {
            trace!(incoming = %incoming, "Dropping event for a stopped session");
            return false;
        }
        match &self.bound {
            None => {
                debug!(session_id = %incoming, "Session bound from inbound event");
                self.bound = Some(incoming.to_string());
                self.retired = None;
                true
            }
            Some(bound) if bound == incoming => true,
            Some(bound) => {
                trace!(bound = %bound, incoming = %incoming, "Dropping event for another session");
                false
            }
        }
    }

    /// Binds `session_id` unless a session is already bound.
    ///
    /// Returns the id that is bound afterwards.
    pub fn bind(&mut self, session_id: &str) -> &str {
        if self.bound.is_none() {
            self.retired = None;
        }
        self.bound.get_or_insert_with(|| session_id.to_string())
    }

    /// The bound session id.
    pub fn bound(&self) -> Option<&str> {
        self.bound.as_deref()
    }

    /// The most recently stopped session id.
    pub fn retired(&self) -> Option<&str> {
        self.retired.as_deref()
    }

    /// Whether a session is bound.
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Unbinds the current session and ignores its events from now on.
    pub fn retire(&mut self) {
        if let Some(bound) = self.bound.take() {
            self.retired = Some(bound);
        }
    }

    /// Forgets both the bound and the retired session.
    pub fn clear(&mut self) {
        self.bound = None;
        self.retired = None;
    }
}
