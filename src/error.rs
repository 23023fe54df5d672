use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
///
/// These are the business-rule kinds the engine is specified around; they
/// are always recovered at the operation boundary, never unhandled crashes.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Operation not valid for the match's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Caller is not one of the match's two participants.
    #[error("not a participant: {0}")]
    NotParticipant(String),
    /// Caller lacks standing for the action (e.g. reporter self-confirming).
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    /// Equal or negative scores.
    #[error("invalid score: {0}")]
    InvalidScore(String),
    /// Admin-selected winner is not a match participant.
    #[error("invalid winner: {0}")]
    InvalidWinner(String),
    /// Dispute already closed.
    #[error("already resolved: {0}")]
    AlreadyResolved(String),
    /// Lock/version contention that outlived the internal retry budget.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { message } => ServiceError::ConcurrencyConflict(message),
            unavailable => ServiceError::Unavailable(unavailable),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or unusable caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller identified but lacks standing for this action.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotParticipant(message) | ServiceError::NotAuthorized(message) => {
                AppError::Forbidden(message)
            }
            ServiceError::InvalidScore(message)
            | ServiceError::InvalidWinner(message)
            | ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::AlreadyResolved(message) => AppError::Conflict(message),
            // Retries already happened inside the service layer; what is
            // left for the client is a plain "try again".
            ServiceError::ConcurrencyConflict(_) => {
                AppError::Conflict("please refresh and try again".into())
            }
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
