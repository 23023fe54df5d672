use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the engine can currently accept lifecycle commands.
///
/// A failing storage ping is logged but the response only flips to degraded
/// once the supervisor has actually torn the store down.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.match_store().await else {
        warn!("health probe while no storage backend is installed");
        return HealthResponse::degraded();
    };

    if let Err(err) = store.health_check().await {
        warn!(error = %err, "storage ping failed during health probe");
    }

    if state.is_degraded() {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
