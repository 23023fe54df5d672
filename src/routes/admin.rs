use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{CreateBracketRequest, DisputeSummary, ResolveDisputeRequest},
        matches::{BracketSummary, MatchSummary},
    },
    error::AppError,
    routes::identity::CurrentUser,
    services::{bracket_service, dispute_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only arbitration and bracket management endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/disputes", get(list_disputes))
        .route("/admin/disputes/{id}", get(get_dispute))
        .route("/admin/disputes/{id}/resolve", post(resolve_dispute))
        .route("/admin/brackets", post(create_bracket))
        .route("/admin/matches/{id}/cancel", post(cancel_match))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Retrieve every open dispute with its match context.
#[utoipa::path(
    get,
    path = "/admin/disputes",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token configured for the service")),
    responses((status = 200, description = "Open disputes", body = [DisputeSummary]))
)]
pub async fn list_disputes(
    State(state): State<SharedState>,
) -> Result<Json<Vec<DisputeSummary>>, AppError> {
    let open = dispute_service::list_open(&state).await?;
    let summaries = open
        .into_iter()
        .map(|(dispute, entity)| DisputeSummary::new(dispute, entity.into()))
        .collect();
    Ok(Json(summaries))
}

/// Retrieve one dispute with its match context.
#[utoipa::path(
    get,
    path = "/admin/disputes/{id}",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token configured for the service"),
        ("id" = String, Path, description = "Identifier of the dispute")
    ),
    responses(
        (status = 200, description = "Dispute", body = DisputeSummary),
        (status = 404, description = "Dispute not found")
    )
)]
pub async fn get_dispute(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DisputeSummary>, AppError> {
    let (dispute, entity) = dispute_service::get_dispute(&state, id).await?;
    Ok(Json(DisputeSummary::new(dispute, entity.into())))
}

/// Close a dispute with an admin-decided winner.
#[utoipa::path(
    post,
    path = "/admin/disputes/{id}/resolve",
    tag = "admin",
    request_body = ResolveDisputeRequest,
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token configured for the service"),
        ("X-User-Id" = String, Header, description = "Identity of the resolving admin"),
        ("id" = String, Path, description = "Identifier of the dispute")
    ),
    responses(
        (status = 200, description = "Dispute resolved; match completed", body = DisputeSummary),
        (status = 400, description = "Chosen winner is not a participant"),
        (status = 409, description = "Dispute already resolved")
    )
)]
pub async fn resolve_dispute(
    State(state): State<SharedState>,
    CurrentUser(admin_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveDisputeRequest>,
) -> Result<Json<DisputeSummary>, AppError> {
    let (dispute, entity) = dispute_service::resolve(&state, id, admin_id, payload).await?;
    Ok(Json(DisputeSummary::new(dispute, entity.into())))
}

/// Seed round 1 of a tournament from an ordered participant list.
#[utoipa::path(
    post,
    path = "/admin/brackets",
    tag = "admin",
    request_body = CreateBracketRequest,
    params(("X-Admin-Token" = String, Header, description = "Admin token configured for the service")),
    responses(
        (status = 200, description = "Bracket seeded", body = BracketSummary),
        (status = 400, description = "Odd, short, or duplicated participant list")
    )
)]
pub async fn create_bracket(
    State(state): State<SharedState>,
    Json(payload): Json<CreateBracketRequest>,
) -> Result<Json<BracketSummary>, AppError> {
    let (tournament_id, matches) =
        bracket_service::create_bracket(&state, payload.tournament_id, &payload.participants)
            .await?;
    Ok(Json(BracketSummary::from_matches(tournament_id, matches)))
}

/// Cancel a match that has not gone live.
#[utoipa::path(
    post,
    path = "/admin/matches/{id}/cancel",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token configured for the service"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Match cancelled", body = MatchSummary),
        (status = 409, description = "Match already went live")
    )
)]
pub async fn cancel_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = bracket_service::cancel_match(&state, id).await?;
    Ok(Json(entity.into()))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.config().admin_token() {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin endpoints are disabled: no admin token configured".into(),
        )),
    }
}
