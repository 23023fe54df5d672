use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{DisputeEntity, DisputeStatus, MatchEntity, MatchState};
use crate::state::handshake::ReadyFlags;

/// Persisted shape of a match. Counters are widened to `i64` because BSON
/// has no unsigned integer types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    tournament_id: Uuid,
    round_number: i64,
    match_order: i64,
    participant1_id: Option<Uuid>,
    participant2_id: Option<Uuid>,
    state: MatchState,
    ready: ReadyFlags,
    reported_by: Option<Uuid>,
    participant1_score: Option<i64>,
    participant2_score: Option<i64>,
    evidence_ref: Option<String>,
    ready_at: Option<DateTime>,
    active_confirmed_at: Option<DateTime>,
    live_at: Option<DateTime>,
    reported_at: Option<DateTime>,
    auto_confirm_at: Option<DateTime>,
    completed_at: Option<DateTime>,
    winner_id: Option<Uuid>,
    version: i64,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            tournament_id: value.tournament_id,
            round_number: value.round_number as i64,
            match_order: value.match_order as i64,
            participant1_id: value.participant1_id,
            participant2_id: value.participant2_id,
            state: value.state,
            ready: value.ready,
            reported_by: value.reported_by,
            participant1_score: value.participant1_score.map(|score| score as i64),
            participant2_score: value.participant2_score.map(|score| score as i64),
            evidence_ref: value.evidence_ref,
            ready_at: value.ready_at.map(DateTime::from_system_time),
            active_confirmed_at: value.active_confirmed_at.map(DateTime::from_system_time),
            live_at: value.live_at.map(DateTime::from_system_time),
            reported_at: value.reported_at.map(DateTime::from_system_time),
            auto_confirm_at: value.auto_confirm_at.map(DateTime::from_system_time),
            completed_at: value.completed_at.map(DateTime::from_system_time),
            winner_id: value.winner_id,
            version: value.version as i64,
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            id: value.id,
            tournament_id: value.tournament_id,
            round_number: value.round_number as u32,
            match_order: value.match_order as u32,
            participant1_id: value.participant1_id,
            participant2_id: value.participant2_id,
            state: value.state,
            ready: value.ready,
            reported_by: value.reported_by,
            participant1_score: value.participant1_score.map(|score| score as u32),
            participant2_score: value.participant2_score.map(|score| score as u32),
            evidence_ref: value.evidence_ref,
            ready_at: value.ready_at.map(|ts| ts.to_system_time()),
            active_confirmed_at: value.active_confirmed_at.map(|ts| ts.to_system_time()),
            live_at: value.live_at.map(|ts| ts.to_system_time()),
            reported_at: value.reported_at.map(|ts| ts.to_system_time()),
            auto_confirm_at: value.auto_confirm_at.map(|ts| ts.to_system_time()),
            completed_at: value.completed_at.map(|ts| ts.to_system_time()),
            winner_id: value.winner_id,
            version: value.version as u64,
        }
    }
}

/// Persisted shape of a dispute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDisputeDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    match_id: Uuid,
    raised_by: Uuid,
    reason: String,
    evidence_ref: Option<String>,
    status: DisputeStatus,
    resolution: Option<String>,
    resolved_by: Option<Uuid>,
    resolved_winner_id: Option<Uuid>,
    opened_at: DateTime,
    resolved_at: Option<DateTime>,
}

impl From<DisputeEntity> for MongoDisputeDocument {
    fn from(value: DisputeEntity) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            raised_by: value.raised_by,
            reason: value.reason,
            evidence_ref: value.evidence_ref,
            status: value.status,
            resolution: value.resolution,
            resolved_by: value.resolved_by,
            resolved_winner_id: value.resolved_winner_id,
            opened_at: DateTime::from_system_time(value.opened_at),
            resolved_at: value.resolved_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoDisputeDocument> for DisputeEntity {
    fn from(value: MongoDisputeDocument) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            raised_by: value.raised_by,
            reason: value.reason,
            evidence_ref: value.evidence_ref,
            status: value.status,
            resolution: value.resolution,
            resolved_by: value.resolved_by,
            resolved_winner_id: value.resolved_winner_id,
            opened_at: value.opened_at.to_system_time(),
            resolved_at: value.resolved_at.map(|ts| ts.to_system_time()),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
