//! Role API handlers.
//!
//! Roles are returned with their linked permissions. Create and update accept
//! a permission id list; on update the list replaces the existing links.
use crate::api::error::{
    ApiError, api_conflict, api_has_dependents, api_internal, api_store_error,
};
use crate::api::types::{ErrorResponse, RoleCreateRequest, RoleListResponse, RoleUpdateRequest};
use crate::api::validate::{ApiPath, ValidatedJson};
use crate::api::{ensure_permissions_exist, ensure_unique, found};
use crate::app::AppState;
use crate::model::{NewRole, Role, RoleDetail, RolePatch};
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

async fn role_detail(state: &AppState, role: Role) -> Result<RoleDetail, ApiError> {
    let permissions = state
        .store
        .role_permissions(role.id)
        .await
        .map_err(|err| api_internal("failed to load role permissions", &err))?;
    Ok(RoleDetail { role, permissions })
}

#[utoipa::path(
    get,
    path = "/api/roles",
    tag = "rbac",
    responses(
        (status = 200, description = "List roles with their permissions", body = RoleListResponse),
        (status = 403, description = "Missing read:roles", body = ErrorResponse)
    )
)]
pub(crate) async fn list_roles(
    State(state): State<AppState>,
) -> Result<Json<RoleListResponse>, ApiError> {
    let roles = state
        .store
        .list_roles()
        .await
        .map_err(|err| api_internal("failed to list roles", &err))?;
    let mut items = Vec::with_capacity(roles.len());
    for role in roles {
        items.push(role_detail(&state, role).await?);
    }
    Ok(Json(RoleListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role with permissions", body = RoleDetail),
        (status = 404, description = "Role not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_role(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<Json<RoleDetail>, ApiError> {
    let role = found(state.store.get_role(id).await, "role not found")?;
    Ok(Json(role_detail(&state, role).await?))
}

#[utoipa::path(
    post,
    path = "/api/roles",
    tag = "rbac",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = RoleDetail),
        (status = 404, description = "Unknown permission id", body = ErrorResponse),
        (status = 409, description = "Role name taken", body = ErrorResponse)
    )
)]
pub(crate) async fn create_role(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RoleCreateRequest>,
) -> Result<(StatusCode, Json<RoleDetail>), ApiError> {
    ensure_unique(
        state
            .store
            .find_role_by_name(&body.name)
            .await
            .map(|found| found.map(|role| role.id)),
        None,
        &format!("role '{}' already exists", body.name),
    )?;
    ensure_permissions_exist(&state, &body.permissions).await?;
    let role = state
        .store
        .create_role(NewRole {
            name: body.name,
            description: body.description,
            permission_ids: body.permissions,
        })
        .await
        .map_err(|err| api_store_error("failed to create role", err))?;
    tracing::info!(role_id = role.id, name = %role.name, "role created");
    Ok((StatusCode::CREATED, Json(role_detail(&state, role).await?)))
}

#[utoipa::path(
    put,
    path = "/api/roles/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Role id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleDetail),
        (status = 404, description = "Role or permission not found", body = ErrorResponse),
        (status = 409, description = "Role name taken", body = ErrorResponse)
    )
)]
pub(crate) async fn update_role(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RoleUpdateRequest>,
) -> Result<Json<RoleDetail>, ApiError> {
    found(state.store.get_role(id).await, "role not found")?;
    if let Some(name) = &body.name {
        ensure_unique(
            state
                .store
                .find_role_by_name(name)
                .await
                .map(|found| found.map(|role| role.id)),
            Some(id),
            &format!("role '{name}' already exists"),
        )?;
    }
    if let Some(permissions) = &body.permissions {
        ensure_permissions_exist(&state, permissions).await?;
    }
    let role = state
        .store
        .update_role(
            id,
            RolePatch {
                name: body.name,
                description: body.description,
                permission_ids: body.permissions,
            },
        )
        .await
        .map_err(|err| api_store_error("failed to update role", err))?;
    Ok(Json(role_detail(&state, role).await?))
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Role not found", body = ErrorResponse),
        (status = 409, description = "Role still assigned to users", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_role(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    found(state.store.get_role(id).await, "role not found")?;
    let dependents = state
        .store
        .count_role_users(id)
        .await
        .map_err(|err| api_internal("failed to count role users", &err))?;
    if dependents > 0 {
        return Err(api_has_dependents("role", dependents, "user assignments"));
    }
    match state.store.delete_role(id).await {
        Ok(()) => {
            tracing::info!(role_id = id, "role deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(StoreError::Conflict(message)) => Err(api_conflict("has_dependents", &message)),
        Err(err) => Err(api_store_error("failed to delete role", err)),
    }
}
