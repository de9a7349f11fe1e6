//! User-role assignment handlers.
use crate::api::error::{ApiError, api_internal, api_not_found, api_store_error};
use crate::api::found;
use crate::api::types::{ErrorResponse, UserRoleCreateRequest, UserRoleListResponse};
use crate::api::validate::{ApiPath, ValidatedJson};
use crate::app::AppState;
use crate::model::UserRole;
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

#[utoipa::path(
    get,
    path = "/api/user-roles",
    tag = "rbac",
    responses(
        (status = 200, description = "List user-role assignments", body = UserRoleListResponse),
        (status = 403, description = "Missing read:user_roles", body = ErrorResponse)
    )
)]
pub(crate) async fn list_user_roles(
    State(state): State<AppState>,
) -> Result<Json<UserRoleListResponse>, ApiError> {
    let items = state
        .store
        .list_user_roles()
        .await
        .map_err(|err| api_internal("failed to list user roles", &err))?;
    Ok(Json(UserRoleListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/api/user-roles",
    tag = "rbac",
    request_body = UserRoleCreateRequest,
    responses(
        (status = 201, description = "Role assigned", body = UserRole),
        (status = 200, description = "Assignment already existed", body = UserRole),
        (status = 404, description = "User or role not found", body = ErrorResponse)
    )
)]
pub(crate) async fn create_user_role(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<UserRoleCreateRequest>,
) -> Result<(StatusCode, Json<UserRole>), ApiError> {
    found(state.store.get_user(body.user_id).await, "user not found")?;
    found(state.store.get_role(body.role_id).await, "role not found")?;
    let linked = state
        .store
        .assign_role(body.user_id, body.role_id)
        .await
        .map_err(|err| api_store_error("failed to assign role", err))?;
    if linked.created {
        tracing::info!(
            user_id = body.user_id,
            role_id = body.role_id,
            "role assigned"
        );
        Ok((StatusCode::CREATED, Json(linked.link)))
    } else {
        Ok((StatusCode::OK, Json(linked.link)))
    }
}

#[utoipa::path(
    delete,
    path = "/api/user-roles/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Assignment id")),
    responses(
        (status = 204, description = "Assignment removed"),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_user_role(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    match state.store.delete_user_role(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::NotFound(_)) => Err(api_not_found("user role not found")),
        Err(err) => Err(api_internal("failed to delete user role", &err)),
    }
}
