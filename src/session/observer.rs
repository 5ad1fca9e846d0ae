//! Session invalidation events.
//!
//! The data layer never navigates. When a session is torn down because the
//! token expired or the backend answered 401, registered observers receive a
//! [`SessionInvalidated`] event and decide what the user sees.

use std::fmt;

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The stored token's `exp` claim has passed (or could not be read).
    Expired,
    /// The backend rejected the request with HTTP 401.
    Unauthorized,
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationReason::Expired => f.write_str("access token expired"),
            InvalidationReason::Unauthorized => f.write_str("backend rejected the session"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInvalidated {
    pub reason: InvalidationReason,
    /// Login entry point the user should be sent to.
    pub redirect_to: String,
}

/// Receives session teardown events. Called synchronously after storage has
/// been cleared.
pub trait SessionObserver: Send + Sync {
    fn session_invalidated(&self, event: &SessionInvalidated);
}

/// Observer that records every event, for tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: std::sync::Mutex<Vec<SessionInvalidated>>,
}

#[cfg(test)]
impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<SessionInvalidated> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl SessionObserver for RecordingObserver {
    fn session_invalidated(&self, event: &SessionInvalidated) {
        self.events.lock().unwrap().push(event.clone());
    }
}
