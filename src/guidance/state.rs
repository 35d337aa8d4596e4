// guidance/state.rs

// Guidance session lifecycle (Idle, Routed, Navigating, Arrived, Stopped)
// as a finite state machine. Commands and loop events are checked against
// the current state before the session acts on them.

use log::{info, warn};

/// Guidance session states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No route computed
    Idle,
    /// Route and turns computed, loop not running
    Routed,
    /// Control loop active
    Navigating,
    /// Reached the destination; loop ended
    Arrived,
    /// Cancelled by the user; loop ended
    Stopped,
}

/// Events that move the session between states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A destination was accepted
    DestinationSet,
    /// A route was computed
    PathCalculated,
    /// The control loop was started
    NavigationStarted,
    /// The loop detected arrival
    DestinationReached,
    /// The user cancelled navigation
    NavigationStopped,
}

impl SessionState {
    /// Next state for `event`, or `None` if the event is not allowed here
    pub fn next(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            // Re-planning needs an explicit stop first
            (Navigating, DestinationSet) | (Navigating, PathCalculated) => None,
            (_, DestinationSet) => Some(Idle),
            (_, PathCalculated) => Some(Routed),
            (Routed, NavigationStarted) => Some(Navigating),
            (Navigating, DestinationReached) => Some(Arrived),
            (Navigating, NavigationStopped) => Some(Stopped),
            _ => None,
        }
    }

    /// Whether the control loop has ended for good
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Arrived | SessionState::Stopped)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Routed => "routed",
            SessionState::Navigating => "navigating",
            SessionState::Arrived => "arrived",
            SessionState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Apply `event` to `state` in place, logging the outcome
pub(crate) fn apply(state: &mut SessionState, event: SessionEvent) -> bool {
    match state.next(event) {
        Some(next) => {
            if next != *state {
                info!("Session transitioned {} -> {} ({:?})", state, next, event);
            }
            *state = next;
            true
        }
        None => {
            warn!("Ignoring {:?} while {}", event, state);
            false
        }
    }
}
