//! Session lifecycle state machine.
//!
//! Transitions are computed by a pure function with an exhaustive match so
//! every (status, event) pair is either explicitly allowed or rejected.
//! Terminal statuses admit no transition at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Accepting participants; the host has not started the drill yet.
    Waiting,
    /// Countdown before gameplay; no new participants.
    Starting,
    /// Gameplay in progress.
    Active,
    /// Gameplay suspended by the host.
    Paused,
    /// Finished normally; results are populated. Terminal.
    Completed,
    /// Abandoned or administratively cancelled. Terminal.
    Cancelled,
}

impl SessionStatus {
    /// Whether the status admits no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Begin the pre-game countdown.
    Countdown,
    /// Start gameplay.
    Start,
    /// Suspend gameplay.
    Pause,
    /// Resume suspended gameplay.
    Resume,
    /// Finish gameplay and publish results.
    End,
    /// Administrative or timeout cancellation.
    Cancel,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the session was in when the invalid event was received.
    pub from: SessionStatus,
    /// The event that cannot be applied from this status.
    pub event: SessionEvent,
}

/// Compute the status after applying `event`, or reject the transition.
pub fn transition(
    from: SessionStatus,
    event: SessionEvent,
) -> Result<SessionStatus, InvalidTransition> {
    use SessionEvent::*;
    use SessionStatus::*;

    let next = match (from, event) {
        (Waiting, Countdown) => Starting,
        (Waiting | Starting, Start) => Active,
        (Active, Pause) => Paused,
        (Paused, Resume) => Active,
        (Active | Paused, End) => Completed,
        (Waiting | Starting | Active | Paused, Cancel) => Cancelled,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}
