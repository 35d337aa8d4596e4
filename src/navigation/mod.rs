//! Navigation system for Wayfinder
//!
//! This module handles route planning over the keyframe graph, turn
//! classification along a route, and distance bookkeeping while the user
//! walks it.

pub mod planner;
pub mod progress;
pub mod turns;

pub use planner::{PathFinder, Route};
pub use progress::ProgressTracker;
pub use turns::{
    bearing, derive_orientations, Turn, TurnClassifier, TurnDirection, TurnSeverity,
    TurnThresholds,
};

use crate::map::KeyframeId;

/// Navigation error types
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationError {
    /// Destination is not a known keyframe
    InvalidDestination(KeyframeId),
    /// Start and goal lie in different graph components
    NoPathFound {
        /// Keyframe the current position snapped to
        start: KeyframeId,
        /// Requested destination
        goal: KeyframeId,
    },
    /// No position fix has been received yet
    MissingPosition,
    /// No destination has been set
    MissingDestination,
    /// Navigation requires a computed route
    NotRouted,
    /// The operation requires navigation to be stopped first
    SessionActive,
}

impl std::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NavigationError::InvalidDestination(id) => {
                write!(f, "Invalid destination: keyframe {} not found", id)
            }
            NavigationError::NoPathFound { start, goal } => {
                write!(f, "No path found from keyframe {} to {}", start, goal)
            }
            NavigationError::MissingPosition => write!(f, "Current position not set"),
            NavigationError::MissingDestination => write!(f, "Destination not set"),
            NavigationError::NotRouted => write!(f, "No path calculated"),
            NavigationError::SessionActive => write!(f, "Navigation in progress"),
        }
    }
}

impl std::error::Error for NavigationError {}
