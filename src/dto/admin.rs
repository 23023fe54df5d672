use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{DisputeEntity, DisputeStatus},
    dto::{format_system_time, matches::MatchSummary},
};

/// Admin decision closing a dispute.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ResolveDisputeRequest {
    /// Participant the admin declares as winner; must be one of the match's
    /// two participants.
    pub winner_id: Uuid,
    /// Written rationale recorded with the dispute.
    #[validate(length(min = 1, max = 2000))]
    pub resolution: String,
}

/// Request to seed round 1 of a tournament from an ordered participant list.
///
/// Adjacent entries are paired; this is the minimal seeding the engine
/// needs, not a seeding algorithm.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateBracketRequest {
    /// Tournament to seed; generated when omitted.
    #[serde(default)]
    pub tournament_id: Option<Uuid>,
    /// Ordered participants; length must be even and at least 2.
    #[validate(length(min = 2))]
    pub participants: Vec<Uuid>,
}

/// Arbitration case joined with its match context for admin review.
#[derive(Debug, Serialize, ToSchema)]
pub struct DisputeSummary {
    /// Dispute identifier.
    pub id: Uuid,
    /// Participant who raised the dispute.
    pub raised_by: Uuid,
    /// Complaint text.
    pub reason: String,
    /// Opaque reference to dispute evidence.
    pub evidence_ref: Option<String>,
    /// Open or resolved.
    pub status: DisputeStatus,
    /// Admin's written resolution, once resolved.
    pub resolution: Option<String>,
    /// Admin who resolved the dispute.
    pub resolved_by: Option<Uuid>,
    /// Winner chosen by the admin.
    pub resolved_winner_id: Option<Uuid>,
    /// RFC3339 time the dispute was opened.
    pub opened_at: String,
    /// RFC3339 time the dispute was resolved.
    pub resolved_at: Option<String>,
    /// Snapshot of the disputed match: participants, reported scores, and
    /// who reported them.
    pub subject: MatchSummary,
}

impl DisputeSummary {
    /// Join a dispute with the snapshot of its match.
    pub fn new(dispute: DisputeEntity, subject: MatchSummary) -> Self {
        Self {
            id: dispute.id,
            raised_by: dispute.raised_by,
            reason: dispute.reason,
            evidence_ref: dispute.evidence_ref,
            status: dispute.status,
            resolution: dispute.resolution,
            resolved_by: dispute.resolved_by,
            resolved_winner_id: dispute.resolved_winner_id,
            opened_at: format_system_time(dispute.opened_at),
            resolved_at: dispute.resolved_at.map(format_system_time),
            subject,
        }
    }
}
