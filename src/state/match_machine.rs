//! Authoritative transition function for the match lifecycle.
//!
//! The function is pure: callers (the service layer) validate authorization
//! and payloads, hold the per-match lock, and persist the outcome. Keeping
//! the table free of side effects makes every edge testable in isolation.

use thiserror::Error;

use crate::dao::models::MatchState;

/// Events that can be applied to a match's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// A participant set the first ready flag.
    ReadyFlagged,
    /// Both participants confirmed active; the match goes live.
    HandshakeCompleted,
    /// A participant submitted a score report.
    ScoreReported,
    /// The counterparty accepted the pending report.
    ScoreConfirmed,
    /// The counterparty disputed the pending report.
    DisputeOpened,
    /// The auto-confirm deadline elapsed with no human action.
    AutoConfirmElapsed,
    /// An administrator resolved the open dispute.
    DisputeResolved,
    /// Tournament-level cancellation before the match went live.
    Cancel,
}

/// Error returned when an event cannot be applied to the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// State the match was in when the invalid event was received.
    pub from: MatchState,
    /// The event that cannot be applied from this state.
    pub event: MatchEvent,
}

/// Compute the next state for an event, or reject the edge.
///
/// `Scheduled` and `AwaitingActivation` are interchangeable sources for the
/// live transition: the latter exists for status reporting only.
pub fn compute_transition(
    from: MatchState,
    event: MatchEvent,
) -> Result<MatchState, InvalidTransition> {
    use MatchEvent as E;
    use MatchState as S;

    let next = match (from, event) {
        (S::Scheduled, E::ReadyFlagged) => S::AwaitingActivation,
        (S::AwaitingActivation, E::ReadyFlagged) => S::AwaitingActivation,
        (S::Scheduled | S::AwaitingActivation, E::HandshakeCompleted) => S::Live,
        (S::Scheduled | S::AwaitingActivation, E::Cancel) => S::Cancelled,
        (S::Live, E::ScoreReported) => S::AwaitingConfirmation,
        (S::AwaitingConfirmation, E::ScoreConfirmed) => S::Completed,
        (S::AwaitingConfirmation, E::AutoConfirmElapsed) => S::Completed,
        (S::AwaitingConfirmation, E::DisputeOpened) => S::Disputed,
        (S::Disputed, E::DisputeResolved) => S::Completed,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use MatchEvent as E;
    use MatchState as S;

    #[test]
    fn happy_path_through_confirmation() {
        let mut state = S::Scheduled;
        for event in [
            E::ReadyFlagged,
            E::HandshakeCompleted,
            E::ScoreReported,
            E::ScoreConfirmed,
        ] {
            state = compute_transition(state, event).unwrap();
        }
        assert_eq!(state, S::Completed);
    }

    #[test]
    fn handshake_completes_straight_from_scheduled() {
        // Both flags can land in one poll window without a ReadyFlagged
        // update ever being persisted.
        assert_eq!(
            compute_transition(S::Scheduled, E::HandshakeCompleted).unwrap(),
            S::Live
        );
    }

    #[test]
    fn timeout_and_confirm_share_the_terminal_edge() {
        assert_eq!(
            compute_transition(S::AwaitingConfirmation, E::AutoConfirmElapsed).unwrap(),
            S::Completed
        );
        assert_eq!(
            compute_transition(S::AwaitingConfirmation, E::ScoreConfirmed).unwrap(),
            S::Completed
        );
    }

    #[test]
    fn dispute_path() {
        let disputed = compute_transition(S::AwaitingConfirmation, E::DisputeOpened).unwrap();
        assert_eq!(disputed, S::Disputed);
        assert_eq!(
            compute_transition(disputed, E::DisputeResolved).unwrap(),
            S::Completed
        );
    }

    #[test]
    fn resolving_is_the_only_way_out_of_disputed() {
        for event in [
            E::ReadyFlagged,
            E::HandshakeCompleted,
            E::ScoreReported,
            E::ScoreConfirmed,
            E::AutoConfirmElapsed,
            E::Cancel,
        ] {
            let err = compute_transition(S::Disputed, event).unwrap_err();
            assert_eq!(err.from, S::Disputed);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn terminal_states_reject_everything() {
        for state in [S::Completed, S::Cancelled] {
            for event in [
                E::ReadyFlagged,
                E::HandshakeCompleted,
                E::ScoreReported,
                E::ScoreConfirmed,
                E::DisputeOpened,
                E::AutoConfirmElapsed,
                E::DisputeResolved,
                E::Cancel,
            ] {
                assert!(compute_transition(state, event).is_err());
            }
        }
    }

    #[test]
    fn cancel_only_before_live() {
        assert_eq!(
            compute_transition(S::Scheduled, E::Cancel).unwrap(),
            S::Cancelled
        );
        assert_eq!(
            compute_transition(S::AwaitingActivation, E::Cancel).unwrap(),
            S::Cancelled
        );
        assert!(compute_transition(S::Live, E::Cancel).is_err());
        assert!(compute_transition(S::AwaitingConfirmation, E::Cancel).is_err());
    }

    #[test]
    fn reporting_requires_live() {
        for state in [S::Scheduled, S::AwaitingActivation, S::AwaitingConfirmation] {
            assert!(compute_transition(state, E::ScoreReported).is_err());
        }
    }
}
