use serde::Serialize;
use utoipa::ToSchema;

/// Payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"ok"` while storage is reachable, `"degraded"` otherwise.
    pub status: String,
}

impl HealthResponse {
    fn with_status(status: &str) -> Self {
        Self {
            status: status.into(),
        }
    }

    /// Storage is reachable; lifecycle commands are accepted.
    pub fn ok() -> Self {
        Self::with_status("ok")
    }

    /// Storage is unreachable; lifecycle commands are rejected.
    pub fn degraded() -> Self {
        Self::with_status("degraded")
    }
}
