//! Permission API handlers.
//!
//! # Purpose
//! CRUD over permissions plus linking a permission to a role. A permission
//! pairs an action with an existing resource; it cannot be deleted while any
//! role still holds it.
use crate::api::error::{
    ApiError, api_conflict, api_has_dependents, api_internal, api_not_found, api_store_error,
};
use crate::api::types::{
    ErrorResponse, PermissionCreateRequest, PermissionListResponse, PermissionUpdateRequest,
    RolePermissionResponse,
};
use crate::api::validate::{ApiPath, ValidatedJson};
use crate::api::{ensure_unique, found};
use crate::app::AppState;
use crate::model::{NewPermission, Permission, PermissionPatch};
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

#[utoipa::path(
    get,
    path = "/api/permissions",
    tag = "rbac",
    responses(
        (status = 200, description = "List permissions", body = PermissionListResponse),
        (status = 403, description = "Missing read:permissions", body = ErrorResponse)
    )
)]
pub(crate) async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<PermissionListResponse>, ApiError> {
    let items = state
        .store
        .list_permissions()
        .await
        .map_err(|err| api_internal("failed to list permissions", &err))?;
    Ok(Json(PermissionListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/permissions/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission", body = Permission),
        (status = 404, description = "Permission not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_permission(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<Json<Permission>, ApiError> {
    let permission = found(state.store.get_permission(id).await, "permission not found")?;
    Ok(Json(permission))
}

#[utoipa::path(
    post,
    path = "/api/permissions",
    tag = "rbac",
    request_body = PermissionCreateRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 404, description = "Resource not found", body = ErrorResponse),
        (status = 409, description = "Permission name taken", body = ErrorResponse)
    )
)]
pub(crate) async fn create_permission(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<PermissionCreateRequest>,
) -> Result<(StatusCode, Json<Permission>), ApiError> {
    found(
        state.store.get_resource(body.resource_id).await,
        "resource not found",
    )?;
    ensure_unique(
        state
            .store
            .find_permission_by_name(&body.name)
            .await
            .map(|found| found.map(|permission| permission.id)),
        None,
        &format!("permission '{}' already exists", body.name),
    )?;
    let permission = state
        .store
        .create_permission(NewPermission {
            name: body.name,
            resource_id: body.resource_id,
            action: body.action,
            description: body.description,
        })
        .await
        .map_err(|err| api_store_error("failed to create permission", err))?;
    tracing::info!(
        permission_id = permission.id,
        name = %permission.name,
        "permission created"
    );
    Ok((StatusCode::CREATED, Json(permission)))
}

#[utoipa::path(
    put,
    path = "/api/permissions/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Permission id")),
    request_body = PermissionUpdateRequest,
    responses(
        (status = 200, description = "Permission updated", body = Permission),
        (status = 404, description = "Permission or resource not found", body = ErrorResponse),
        (status = 409, description = "Permission name taken", body = ErrorResponse)
    )
)]
pub(crate) async fn update_permission(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<PermissionUpdateRequest>,
) -> Result<Json<Permission>, ApiError> {
    found(state.store.get_permission(id).await, "permission not found")?;
    if let Some(resource_id) = body.resource_id {
        found(state.store.get_resource(resource_id).await, "resource not found")?;
    }
    if let Some(name) = &body.name {
        ensure_unique(
            state
                .store
                .find_permission_by_name(name)
                .await
                .map(|found| found.map(|permission| permission.id)),
            Some(id),
            &format!("permission '{name}' already exists"),
        )?;
    }
    let permission = state
        .store
        .update_permission(
            id,
            PermissionPatch {
                name: body.name,
                resource_id: body.resource_id,
                action: body.action,
                description: body.description,
            },
        )
        .await
        .map_err(|err| api_store_error("failed to update permission", err))?;
    Ok(Json(permission))
}

#[utoipa::path(
    delete,
    path = "/api/permissions/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Permission id")),
    responses(
        (status = 204, description = "Permission deleted"),
        (status = 404, description = "Permission not found", body = ErrorResponse),
        (status = 409, description = "Permission still linked to roles", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_permission(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    found(state.store.get_permission(id).await, "permission not found")?;
    let dependents = state
        .store
        .count_permission_roles(id)
        .await
        .map_err(|err| api_internal("failed to count permission roles", &err))?;
    if dependents > 0 {
        return Err(api_has_dependents("permission", dependents, "role links"));
    }
    match state.store.delete_permission(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::Conflict(message)) => Err(api_conflict("has_dependents", &message)),
        Err(err) => Err(api_store_error("failed to delete permission", err)),
    }
}

#[utoipa::path(
    post,
    path = "/api/permissions/{id}/roles/{role_id}",
    tag = "rbac",
    params(
        ("id" = i64, Path, description = "Permission id"),
        ("role_id" = i64, Path, description = "Role id")
    ),
    responses(
        (status = 201, description = "Permission linked to role", body = RolePermissionResponse),
        (status = 200, description = "Link already existed", body = RolePermissionResponse),
        (status = 404, description = "Permission or role not found", body = ErrorResponse)
    )
)]
pub(crate) async fn attach_to_role(
    ApiPath((id, role_id)): ApiPath<(i64, i64)>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RolePermissionResponse>), ApiError> {
    found(state.store.get_permission(id).await, "permission not found")?;
    found(state.store.get_role(role_id).await, "role not found")?;
    let linked = state
        .store
        .attach_permission(role_id, id)
        .await
        .map_err(|err| api_store_error("failed to link permission", err))?;
    let status = if linked.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(RolePermissionResponse { link: linked.link })))
}

#[utoipa::path(
    delete,
    path = "/api/permissions/{id}/roles/{role_id}",
    tag = "rbac",
    params(
        ("id" = i64, Path, description = "Permission id"),
        ("role_id" = i64, Path, description = "Role id")
    ),
    responses(
        (status = 204, description = "Link removed"),
        (status = 404, description = "Link not found", body = ErrorResponse)
    )
)]
pub(crate) async fn detach_from_role(
    ApiPath((id, role_id)): ApiPath<(i64, i64)>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    match state.store.detach_permission(role_id, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::NotFound(_)) => Err(api_not_found("role permission not found")),
        Err(err) => Err(api_internal("failed to unlink permission", &err)),
    }
}
