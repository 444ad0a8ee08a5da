//! Listener lifecycle state machine
//!
//! ```text
//! Created ──start──→ Listening ──stop──→ Stopped
//! ```
//!
//! There is no transition back to `Listening`; a stopped listener is replaced,
//! not restarted.

use std::fmt;

/// Lifecycle state of a transfer listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListenerState {
    /// Constructed, no socket bound yet.
    #[default]
    Created,
    /// Socket bound and accept loop running.
    Listening,
    /// Socket closed, accept loop finished.
    Stopped,
}

impl ListenerState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: ListenerState) -> bool {
        matches!(
            (self, next),
            (ListenerState::Created, ListenerState::Listening)
                | (ListenerState::Listening, ListenerState::Stopped)
        )
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerState::Created => "Created",
            ListenerState::Listening => "Listening",
            ListenerState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}
