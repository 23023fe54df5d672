use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{MatchEntity, MatchState},
    dto::{format_system_time, validation::validate_reason},
    state::handshake::{HandshakeStatus, ReadyFlags},
};

/// Payload a participant submits to report the outcome of a live match.
///
/// Scores arrive signed so a negative value surfaces as a domain error
/// rather than a deserialization failure.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReportScoreRequest {
    /// Score for participant 1.
    pub participant1_score: i64,
    /// Score for participant 2.
    pub participant2_score: i64,
    /// Opaque reference to externally uploaded evidence.
    #[serde(default)]
    #[validate(length(max = 512))]
    pub evidence_ref: Option<String>,
}

/// Payload the non-reporting participant submits to contest a report.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DisputeRequest {
    /// Why the pending report is wrong.
    #[validate(custom(function = "validate_reason"))]
    pub reason: String,
    /// Opaque reference to externally uploaded evidence.
    #[serde(default)]
    #[validate(length(max = 512))]
    pub evidence_ref: Option<String>,
}

/// Per-side view of the pre-match handshake.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HandshakeSideSummary {
    /// The participant declared themselves ready.
    pub ready: bool,
    /// The participant confirmed the match is underway.
    pub active_confirmed: bool,
}

/// Snapshot of the ready/active handshake.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HandshakeSummary {
    /// Derived progress of the handshake.
    pub status: HandshakeStatus,
    /// Flags for the `participant1_id` side.
    pub participant1: HandshakeSideSummary,
    /// Flags for the `participant2_id` side.
    pub participant2: HandshakeSideSummary,
}

impl From<ReadyFlags> for HandshakeSummary {
    fn from(flags: ReadyFlags) -> Self {
        Self {
            status: flags.status(),
            participant1: HandshakeSideSummary {
                ready: flags.one.ready,
                active_confirmed: flags.one.active_confirmed,
            },
            participant2: HandshakeSideSummary {
                ready: flags.two.ready,
                active_confirmed: flags.two.active_confirmed,
            },
        }
    }
}

/// Full snapshot of one match, as returned by every query and command.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummary {
    /// Match identifier.
    pub id: Uuid,
    /// Tournament the match belongs to.
    pub tournament_id: Uuid,
    /// 1-based round within the bracket.
    pub round_number: u32,
    /// 1-based position within the round.
    pub match_order: u32,
    /// First participant, `None` while the slot is TBD.
    pub participant1_id: Option<Uuid>,
    /// Second participant, `None` while the slot is TBD.
    pub participant2_id: Option<Uuid>,
    /// Current lifecycle state.
    pub state: MatchState,
    /// Ready/active handshake snapshot.
    pub handshake: HandshakeSummary,
    /// Participant whose report is pending, if any.
    pub reported_by: Option<Uuid>,
    /// Reported score for participant 1.
    pub participant1_score: Option<u32>,
    /// Reported score for participant 2.
    pub participant2_score: Option<u32>,
    /// Opaque reference to reported evidence.
    pub evidence_ref: Option<String>,
    /// Winner of the match (provisional while a report is pending).
    pub winner_id: Option<Uuid>,
    /// RFC3339 time the match went live.
    pub live_at: Option<String>,
    /// RFC3339 time the pending report was filed.
    pub reported_at: Option<String>,
    /// RFC3339 deadline for the pending report to auto-confirm.
    pub auto_confirm_at: Option<String>,
    /// Seconds left until the pending report auto-confirms.
    pub auto_confirm_remaining_secs: Option<u64>,
    /// RFC3339 time the match completed.
    pub completed_at: Option<String>,
}

impl From<MatchEntity> for MatchSummary {
    fn from(entity: MatchEntity) -> Self {
        let remaining = match (entity.state, entity.auto_confirm_at) {
            (MatchState::AwaitingConfirmation, Some(deadline)) => Some(
                deadline
                    .duration_since(SystemTime::now())
                    .unwrap_or_default()
                    .as_secs(),
            ),
            _ => None,
        };

        Self {
            id: entity.id,
            tournament_id: entity.tournament_id,
            round_number: entity.round_number,
            match_order: entity.match_order,
            participant1_id: entity.participant1_id,
            participant2_id: entity.participant2_id,
            state: entity.state,
            handshake: entity.ready.into(),
            reported_by: entity.reported_by,
            participant1_score: entity.participant1_score,
            participant2_score: entity.participant2_score,
            evidence_ref: entity.evidence_ref,
            winner_id: entity.winner_id,
            live_at: entity.live_at.map(format_system_time),
            reported_at: entity.reported_at.map(format_system_time),
            auto_confirm_at: entity.auto_confirm_at.map(format_system_time),
            auto_confirm_remaining_secs: remaining,
            completed_at: entity.completed_at.map(format_system_time),
        }
    }
}

/// Response to a `ConfirmActive` command.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActivationResponse {
    /// Whether this call (or an earlier one) took the match live.
    pub match_live: bool,
    /// Updated match snapshot.
    pub summary: MatchSummary,
}

/// Response to a `Dispute` command.
#[derive(Debug, Serialize, ToSchema)]
pub struct DisputeOpenedResponse {
    /// Identifier of the newly opened arbitration case.
    pub dispute_id: Uuid,
    /// Updated match snapshot.
    pub summary: MatchSummary,
}

/// One round of a tournament bracket.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundSummary {
    /// 1-based round number.
    pub round_number: u32,
    /// Matches of the round, ordered by `match_order`.
    pub matches: Vec<MatchSummary>,
}

/// Bracket view of a tournament, grouped by round.
#[derive(Debug, Serialize, ToSchema)]
pub struct BracketSummary {
    /// Tournament identifier.
    pub tournament_id: Uuid,
    /// Rounds in ascending order.
    pub rounds: Vec<RoundSummary>,
}

impl BracketSummary {
    /// Group tournament matches (already sorted by round and order) by round.
    pub fn from_matches(tournament_id: Uuid, matches: Vec<MatchEntity>) -> Self {
        let mut rounds: IndexMap<u32, Vec<MatchSummary>> = IndexMap::new();
        for entity in matches {
            rounds
                .entry(entity.round_number)
                .or_default()
                .push(entity.into());
        }

        Self {
            tournament_id,
            rounds: rounds
                .into_iter()
                .map(|(round_number, matches)| RoundSummary {
                    round_number,
                    matches,
                })
                .collect(),
        }
    }
}
