//! Bearer session extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use crate::error::ApiError;
use crate::session::SessionError;
use crate::state::AppState;

/// The identity id carried by a verified session token.
///
/// Handlers taking this extractor never run for an unauthenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity(pub String);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::unauthenticated("Missing Authorization header"))?;

        match state.sessions.verify(token) {
            Ok(identity_id) => Ok(Self(identity_id)),
            Err(SessionError::Expired) => {
                debug!("rejected expired session token");
                Err(ApiError::unauthenticated("Session expired"))
            }
            Err(err) => {
                debug!(error = %err, "rejected session token");
                Err(ApiError::unauthenticated("Invalid token"))
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
