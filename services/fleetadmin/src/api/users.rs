//! User listing.
//!
//! Accounts are created through `/api/auth/register`; this surface is
//! read-only and never exposes credentials.
use crate::api::error::{ApiError, api_internal};
use crate::api::types::{ErrorResponse, UserListResponse};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "rbac",
    responses(
        (status = 200, description = "List users", body = UserListResponse),
        (status = 403, description = "Missing read:users", body = ErrorResponse)
    )
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, ApiError> {
    let items = state
        .store
        .list_users()
        .await
        .map_err(|err| api_internal("failed to list users", &err))?;
    Ok(Json(UserListResponse { items }))
}
