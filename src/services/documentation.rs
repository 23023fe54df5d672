use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Bracket Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::get_match,
        crate::routes::matches::get_bracket,
        crate::routes::matches::mark_ready,
        crate::routes::matches::mark_not_ready,
        crate::routes::matches::confirm_active,
        crate::routes::matches::report_score,
        crate::routes::matches::confirm_score,
        crate::routes::matches::open_dispute,
        crate::routes::admin::list_disputes,
        crate::routes::admin::get_dispute,
        crate::routes::admin::resolve_dispute,
        crate::routes::admin::create_bracket,
        crate::routes::admin::cancel_match,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::ReportScoreRequest,
            crate::dto::matches::DisputeRequest,
            crate::dto::matches::HandshakeSideSummary,
            crate::dto::matches::HandshakeSummary,
            crate::dto::matches::MatchSummary,
            crate::dto::matches::ActivationResponse,
            crate::dto::matches::DisputeOpenedResponse,
            crate::dto::matches::RoundSummary,
            crate::dto::matches::BracketSummary,
            crate::dto::admin::ResolveDisputeRequest,
            crate::dto::admin::CreateBracketRequest,
            crate::dto::admin::DisputeSummary,
            crate::dao::models::MatchState,
            crate::dao::models::DisputeStatus,
            crate::state::handshake::HandshakeStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Match lifecycle operations for participants"),
        (name = "tournaments", description = "Bracket views"),
        (name = "admin", description = "Dispute arbitration and bracket administration"),
    )
)]
pub struct ApiDoc;
