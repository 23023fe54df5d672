//! Pre-match ready/active handshake flags and their derived status.
//!
//! Each participant carries two independent booleans so either side can act
//! in either order; the externally visible status is always derived, never
//! stored on its own.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Which of the two participant slots of a match a user occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantSlot {
    /// The `participant1_id` slot.
    One,
    /// The `participant2_id` slot.
    Two,
}

/// Flags tracked per participant during the pre-match handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideFlags {
    /// The participant declared themselves ready.
    pub ready: bool,
    /// The participant confirmed the match is actually underway.
    pub active_confirmed: bool,
}

/// Handshake flags for both sides of a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyFlags {
    /// Flags for the `participant1_id` side.
    pub one: SideFlags,
    /// Flags for the `participant2_id` side.
    pub two: SideFlags,
}

/// Derived progress of the two-party handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStatus {
    /// Neither participant has marked ready.
    Waiting,
    /// Exactly one participant has marked ready.
    OneReady,
    /// Both participants are ready, at least one active confirmation missing.
    BothReady,
    /// Both participants confirmed the match is active.
    HandshakeCompleted,
}

/// Invalid handshake actions rejected before any flag is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// Active confirmation requires the caller to be ready first.
    #[error("participant has not marked ready")]
    NotReady,
    /// Ready cannot be retracted once the caller confirmed active.
    #[error("participant already confirmed the match as active")]
    AlreadyCommitted,
}

impl ReadyFlags {
    fn side(&self, slot: ParticipantSlot) -> &SideFlags {
        match slot {
            ParticipantSlot::One => &self.one,
            ParticipantSlot::Two => &self.two,
        }
    }

    fn side_mut(&mut self, slot: ParticipantSlot) -> &mut SideFlags {
        match slot {
            ParticipantSlot::One => &mut self.one,
            ParticipantSlot::Two => &mut self.two,
        }
    }

    /// Whether the given side has marked ready.
    pub fn is_ready(&self, slot: ParticipantSlot) -> bool {
        self.side(slot).ready
    }

    /// Whether the given side has confirmed the match as active.
    pub fn is_active_confirmed(&self, slot: ParticipantSlot) -> bool {
        self.side(slot).active_confirmed
    }

    /// Set the ready flag for one side. Returns `false` when the flag was
    /// already set (callers treat that as an idempotent no-op).
    pub fn mark_ready(&mut self, slot: ParticipantSlot) -> bool {
        let side = self.side_mut(slot);
        if side.ready {
            return false;
        }
        side.ready = true;
        true
    }

    /// Retract a ready flag. Rejected once the side confirmed active, so one
    /// participant cannot back out after the other committed.
    pub fn mark_not_ready(&mut self, slot: ParticipantSlot) -> Result<(), HandshakeError> {
        let side = self.side_mut(slot);
        if !side.ready {
            return Err(HandshakeError::NotReady);
        }
        if side.active_confirmed {
            return Err(HandshakeError::AlreadyCommitted);
        }
        side.ready = false;
        Ok(())
    }

    /// Confirm the match as active for one side. Requires that side to be
    /// ready. Returns `false` when already confirmed (idempotent no-op).
    pub fn confirm_active(&mut self, slot: ParticipantSlot) -> Result<bool, HandshakeError> {
        let side = self.side_mut(slot);
        if !side.ready {
            return Err(HandshakeError::NotReady);
        }
        if side.active_confirmed {
            return Ok(false);
        }
        side.active_confirmed = true;
        Ok(true)
    }

    /// Whether both sides confirmed active, i.e. the match may go live.
    pub fn handshake_completed(&self) -> bool {
        self.one.active_confirmed && self.two.active_confirmed
    }

    /// Derive the externally visible handshake status from the raw flags.
    pub fn status(&self) -> HandshakeStatus {
        if self.handshake_completed() {
            return HandshakeStatus::HandshakeCompleted;
        }
        match (self.one.ready, self.two.ready) {
            (true, true) => HandshakeStatus::BothReady,
            (true, false) | (false, true) => HandshakeStatus::OneReady,
            (false, false) => HandshakeStatus::Waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_progresses_with_flags() {
        let mut flags = ReadyFlags::default();
        assert_eq!(flags.status(), HandshakeStatus::Waiting);

        assert!(flags.mark_ready(ParticipantSlot::One));
        assert_eq!(flags.status(), HandshakeStatus::OneReady);

        assert!(flags.mark_ready(ParticipantSlot::Two));
        assert_eq!(flags.status(), HandshakeStatus::BothReady);

        assert!(flags.confirm_active(ParticipantSlot::One).unwrap());
        assert_eq!(flags.status(), HandshakeStatus::BothReady);

        assert!(flags.confirm_active(ParticipantSlot::Two).unwrap());
        assert_eq!(flags.status(), HandshakeStatus::HandshakeCompleted);
        assert!(flags.handshake_completed());
    }

    #[test]
    fn mark_ready_is_idempotent() {
        let mut flags = ReadyFlags::default();
        assert!(flags.mark_ready(ParticipantSlot::One));
        assert!(!flags.mark_ready(ParticipantSlot::One));
        assert_eq!(flags.status(), HandshakeStatus::OneReady);
    }

    #[test]
    fn confirm_active_requires_ready() {
        let mut flags = ReadyFlags::default();
        assert_eq!(
            flags.confirm_active(ParticipantSlot::Two),
            Err(HandshakeError::NotReady)
        );
    }

    #[test]
    fn confirm_active_repeat_is_noop() {
        let mut flags = ReadyFlags::default();
        flags.mark_ready(ParticipantSlot::One);
        assert!(flags.confirm_active(ParticipantSlot::One).unwrap());
        assert!(!flags.confirm_active(ParticipantSlot::One).unwrap());
    }

    #[test]
    fn cannot_retract_after_active_confirmation() {
        let mut flags = ReadyFlags::default();
        flags.mark_ready(ParticipantSlot::One);
        flags.confirm_active(ParticipantSlot::One).unwrap();
        assert_eq!(
            flags.mark_not_ready(ParticipantSlot::One),
            Err(HandshakeError::AlreadyCommitted)
        );
    }

    #[test]
    fn retract_before_commit_resets_status() {
        let mut flags = ReadyFlags::default();
        flags.mark_ready(ParticipantSlot::One);
        flags.mark_ready(ParticipantSlot::Two);
        flags.mark_not_ready(ParticipantSlot::Two).unwrap();
        assert_eq!(flags.status(), HandshakeStatus::OneReady);
    }

    #[test]
    fn retract_without_ready_is_rejected() {
        let mut flags = ReadyFlags::default();
        assert_eq!(
            flags.mark_not_ready(ParticipantSlot::One),
            Err(HandshakeError::NotReady)
        );
    }
}
