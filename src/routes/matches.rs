use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dao::models::MatchState,
    dto::matches::{
        ActivationResponse, BracketSummary, DisputeOpenedResponse, DisputeRequest, MatchSummary,
        ReportScoreRequest,
    },
    error::AppError,
    routes::identity::CurrentUser,
    services::{handshake_service, match_service},
    state::SharedState,
};

/// Participant-facing match lifecycle routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/ready", post(mark_ready))
        .route("/matches/{id}/unready", post(mark_not_ready))
        .route("/matches/{id}/activate", post(confirm_active))
        .route("/matches/{id}/report", post(report_score))
        .route("/matches/{id}/confirm", post(confirm_score))
        .route("/matches/{id}/dispute", post(open_dispute))
        .route("/tournaments/{id}/bracket", get(get_bracket))
}

/// Retrieve the full snapshot of one match.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Match snapshot", body = MatchSummary),
        (status = 404, description = "Match not found")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = match_service::get_match(&state, id).await?;
    Ok(Json(entity.into()))
}

/// Retrieve a tournament's bracket grouped by round.
#[utoipa::path(
    get,
    path = "/tournaments/{id}/bracket",
    tag = "tournaments",
    params(("id" = String, Path, description = "Identifier of the tournament")),
    responses(
        (status = 200, description = "Bracket grouped by round", body = BracketSummary),
        (status = 404, description = "Tournament has no matches")
    )
)]
pub async fn get_bracket(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BracketSummary>, AppError> {
    let matches = match_service::list_bracket(&state, id).await?;
    Ok(Json(BracketSummary::from_matches(id, matches)))
}

/// Declare the caller ready to play.
#[utoipa::path(
    post,
    path = "/matches/{id}/ready",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated participant id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Updated match snapshot", body = MatchSummary),
        (status = 403, description = "Caller is not a participant"),
        (status = 409, description = "Match is past the handshake")
    )
)]
pub async fn mark_ready(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = handshake_service::mark_ready(&state, id, user_id).await?;
    Ok(Json(entity.into()))
}

/// Retract the caller's ready declaration.
#[utoipa::path(
    post,
    path = "/matches/{id}/unready",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated participant id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Updated match snapshot", body = MatchSummary),
        (status = 409, description = "Caller already committed or never marked ready")
    )
)]
pub async fn mark_not_ready(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = handshake_service::mark_not_ready(&state, id, user_id).await?;
    Ok(Json(entity.into()))
}

/// Confirm the match is underway for the caller's side.
#[utoipa::path(
    post,
    path = "/matches/{id}/activate",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated participant id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Activation outcome", body = ActivationResponse),
        (status = 409, description = "Caller has not marked ready")
    )
)]
pub async fn confirm_active(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ActivationResponse>, AppError> {
    let (_, entity) = handshake_service::confirm_active(&state, id, user_id).await?;
    let match_live = entity.state == MatchState::Live;
    Ok(Json(ActivationResponse {
        match_live,
        summary: entity.into(),
    }))
}

/// Report the outcome of a live match.
#[utoipa::path(
    post,
    path = "/matches/{id}/report",
    tag = "matches",
    request_body = ReportScoreRequest,
    params(
        ("X-User-Id" = String, Header, description = "Authenticated participant id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Report accepted; awaiting confirmation", body = MatchSummary),
        (status = 400, description = "Tied or negative scores"),
        (status = 409, description = "Match is not live")
    )
)]
pub async fn report_score(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportScoreRequest>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = match_service::report_score(&state, id, user_id, payload).await?;
    Ok(Json(entity.into()))
}

/// Accept the pending score report as the opposing participant.
#[utoipa::path(
    post,
    path = "/matches/{id}/confirm",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated participant id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Match completed", body = MatchSummary),
        (status = 403, description = "Reporter cannot confirm their own report"),
        (status = 409, description = "No report is pending")
    )
)]
pub async fn confirm_score(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = match_service::confirm_score(&state, id, user_id).await?;
    Ok(Json(entity.into()))
}

/// Contest the pending score report.
#[utoipa::path(
    post,
    path = "/matches/{id}/dispute",
    tag = "matches",
    request_body = DisputeRequest,
    params(
        ("X-User-Id" = String, Header, description = "Authenticated participant id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Dispute opened", body = DisputeOpenedResponse),
        (status = 403, description = "Reporter cannot dispute their own report"),
        (status = 409, description = "No report is pending")
    )
)]
pub async fn open_dispute(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DisputeRequest>,
) -> Result<Json<DisputeOpenedResponse>, AppError> {
    let (dispute, entity) = match_service::dispute(&state, id, user_id, payload).await?;
    Ok(Json(DisputeOpenedResponse {
        dispute_id: dispute.id,
        summary: entity.into(),
    }))
}
