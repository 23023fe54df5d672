use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::handshake::{ParticipantSlot, ReadyFlags};

/// Lifecycle state of a match, persisted by the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// Created by the bracket, participants possibly still TBD.
    Scheduled,
    /// At least one ready flag is set; reported for status purposes only.
    AwaitingActivation,
    /// Both participants confirmed presence; play is underway.
    Live,
    /// A score was reported and awaits the counterparty or the deadline.
    AwaitingConfirmation,
    /// The counterparty disputed the report; an admin must arbitrate.
    Disputed,
    /// Terminal: exactly one authoritative winner recorded.
    Completed,
    /// Terminal: tournament-level cancellation before the match went live.
    Cancelled,
}

/// One scheduled contest between two participants in one bracket slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Tournament this match belongs to.
    pub tournament_id: Uuid,
    /// 1-based round within the bracket.
    pub round_number: u32,
    /// 1-based position within the round; drives next-round pairing.
    pub match_order: u32,
    /// First participant, `None` until the feeding match resolves.
    pub participant1_id: Option<Uuid>,
    /// Second participant, `None` until the feeding match resolves.
    pub participant2_id: Option<Uuid>,
    /// Current lifecycle state.
    pub state: MatchState,
    /// Ready/active handshake flags for both sides.
    pub ready: ReadyFlags,
    /// Participant whose score report is pending confirmation.
    pub reported_by: Option<Uuid>,
    /// Reported score for participant 1.
    pub participant1_score: Option<u32>,
    /// Reported score for participant 2.
    pub participant2_score: Option<u32>,
    /// Opaque pointer to externally stored evidence.
    pub evidence_ref: Option<String>,
    /// First time either participant marked ready.
    pub ready_at: Option<SystemTime>,
    /// Time both participants had confirmed active.
    pub active_confirmed_at: Option<SystemTime>,
    /// Time the match went live.
    pub live_at: Option<SystemTime>,
    /// Time the pending score report was submitted.
    pub reported_at: Option<SystemTime>,
    /// Deadline after which the pending report auto-confirms.
    pub auto_confirm_at: Option<SystemTime>,
    /// Time the match reached its terminal completed state.
    pub completed_at: Option<SystemTime>,
    /// Winner of the match; provisional from report time, authoritative
    /// once the match completes.
    pub winner_id: Option<Uuid>,
    /// Optimistic-concurrency version, bumped on every committed update.
    pub version: u64,
}

impl MatchEntity {
    /// Build a fresh scheduled match for a bracket slot.
    pub fn new(
        tournament_id: Uuid,
        round_number: u32,
        match_order: u32,
        participant1_id: Option<Uuid>,
        participant2_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            round_number,
            match_order,
            participant1_id,
            participant2_id,
            state: MatchState::Scheduled,
            ready: ReadyFlags::default(),
            reported_by: None,
            participant1_score: None,
            participant2_score: None,
            evidence_ref: None,
            ready_at: None,
            active_confirmed_at: None,
            live_at: None,
            reported_at: None,
            auto_confirm_at: None,
            completed_at: None,
            winner_id: None,
            version: 0,
        }
    }

    /// Which slot the given user occupies, if they are a participant.
    pub fn slot_of(&self, user_id: Uuid) -> Option<ParticipantSlot> {
        if self.participant1_id == Some(user_id) {
            Some(ParticipantSlot::One)
        } else if self.participant2_id == Some(user_id) {
            Some(ParticipantSlot::Two)
        } else {
            None
        }
    }

    /// Whether the given user is one of the two participants.
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.slot_of(user_id).is_some()
    }

    /// Participant id for a slot.
    pub fn participant(&self, slot: ParticipantSlot) -> Option<Uuid> {
        match slot {
            ParticipantSlot::One => self.participant1_id,
            ParticipantSlot::Two => self.participant2_id,
        }
    }
}

/// Status of an arbitration case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Awaiting an administrator decision.
    Open,
    /// Closed by an administrator; the decision is final.
    Resolved,
}

/// One arbitration case tied 1:1 to a match in the disputed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeEntity {
    /// Primary key of the dispute.
    pub id: Uuid,
    /// The disputed match.
    pub match_id: Uuid,
    /// Participant who raised the dispute.
    pub raised_by: Uuid,
    /// Free-text explanation, never empty.
    pub reason: String,
    /// Opaque pointer to externally stored evidence.
    pub evidence_ref: Option<String>,
    /// Open or resolved.
    pub status: DisputeStatus,
    /// Admin's written resolution.
    pub resolution: Option<String>,
    /// Admin who resolved the dispute.
    pub resolved_by: Option<Uuid>,
    /// Winner chosen by the admin, overriding the reported scores.
    pub resolved_winner_id: Option<Uuid>,
    /// Time the dispute was opened.
    pub opened_at: SystemTime,
    /// Time the dispute was resolved.
    pub resolved_at: Option<SystemTime>,
}

impl DisputeEntity {
    /// Open a new dispute against a match.
    pub fn open(match_id: Uuid, raised_by: Uuid, reason: String, evidence_ref: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            match_id,
            raised_by,
            reason,
            evidence_ref,
            status: DisputeStatus::Open,
            resolution: None,
            resolved_by: None,
            resolved_winner_id: None,
            opened_at: SystemTime::now(),
            resolved_at: None,
        }
    }
}
