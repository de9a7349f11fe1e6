//! Per-request identity.
//!
//! [`CurrentUser`] is decoded from the session token on each request. The
//! route guard inserts it into request extensions; handlers on unguarded
//! routes (`/api/auth/me` and friends) extract it directly.
use crate::api::error::{ApiError, api_internal, api_unauthorized};
use crate::app::AppState;
use crate::auth::session::extract_session_token;
use crate::store::StoreError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
}

/// Resolve the acting user from the session token in `headers`.
///
/// # Errors
/// - 401 when the token is missing, invalid, expired, or names a deleted user.
/// - 500 when the user lookup fails.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    let token = extract_session_token(headers).ok_or_else(|| api_unauthorized("missing session"))?;
    let claims = state.sessions.verify(token).map_err(|err| {
        tracing::debug!(error = %err, "session token rejected");
        api_unauthorized("invalid session")
    })?;
    let user_id = claims
        .user_id()
        .map_err(|_| api_unauthorized("invalid session"))?;
    match state.store.get_user(user_id).await {
        Ok(user) => Ok(CurrentUser {
            id: user.id,
            email: user.email,
        }),
        Err(StoreError::NotFound(_)) => Err(api_unauthorized("invalid session")),
        Err(err) => Err(api_internal("failed to load session user", &err)),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }
        authenticate(state, &parts.headers).await
    }
}
