//! Caller identity extraction.
//!
//! Authentication lives at the gateway in front of this service; the
//! engine trusts the forwarded `X-User-Id` header as the authenticated
//! participant identity.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the authenticated caller's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller identity taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing user header `X-User-Id`".into()))?;

        let user_id = raw
            .parse::<Uuid>()
            .map_err(|_| AppError::Unauthorized(format!("invalid user id `{raw}`")))?;

        Ok(Self(user_id))
    }
}
