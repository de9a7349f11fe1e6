//! Resource API handlers.
//!
//! # Purpose
//! CRUD over protectable resources. Resource names are the right-hand side of
//! permission keys (`read:<name>`), so they follow the lowercase grammar and
//! cannot be deleted while permissions still point at them.
use crate::api::error::{
    ApiError, api_conflict, api_has_dependents, api_internal, api_store_error,
};
use crate::api::types::{
    ErrorResponse, ResourceCreateRequest, ResourceListResponse, ResourceUpdateRequest,
};
use crate::api::validate::{ApiPath, ValidatedJson};
use crate::api::{ensure_unique, found};
use crate::app::AppState;
use crate::model::{NewResource, Resource, ResourcePatch};
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

#[utoipa::path(
    get,
    path = "/api/resources",
    tag = "rbac",
    responses(
        (status = 200, description = "List resources", body = ResourceListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Missing read:resources", body = ErrorResponse)
    )
)]
pub(crate) async fn list_resources(
    State(state): State<AppState>,
) -> Result<Json<ResourceListResponse>, ApiError> {
    let items = state
        .store
        .list_resources()
        .await
        .map_err(|err| api_internal("failed to list resources", &err))?;
    Ok(Json(ResourceListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/resources/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Resource id")),
    responses(
        (status = 200, description = "Resource", body = Resource),
        (status = 404, description = "Resource not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_resource(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<Json<Resource>, ApiError> {
    let resource = found(state.store.get_resource(id).await, "resource not found")?;
    Ok(Json(resource))
}

#[utoipa::path(
    post,
    path = "/api/resources",
    tag = "rbac",
    request_body = ResourceCreateRequest,
    responses(
        (status = 201, description = "Resource created", body = Resource),
        (status = 400, description = "Invalid resource", body = ErrorResponse),
        (status = 409, description = "Resource name taken", body = ErrorResponse)
    )
)]
pub(crate) async fn create_resource(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ResourceCreateRequest>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    ensure_unique(
        state
            .store
            .find_resource_by_name(&body.name)
            .await
            .map(|found| found.map(|resource| resource.id)),
        None,
        &format!("resource '{}' already exists", body.name),
    )?;
    let resource = state
        .store
        .create_resource(NewResource {
            name: body.name,
            label: body.label,
        })
        .await
        .map_err(|err| api_store_error("failed to create resource", err))?;
    tracing::info!(resource_id = resource.id, name = %resource.name, "resource created");
    Ok((StatusCode::CREATED, Json(resource)))
}

#[utoipa::path(
    put,
    path = "/api/resources/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Resource id")),
    request_body = ResourceUpdateRequest,
    responses(
        (status = 200, description = "Resource updated", body = Resource),
        (status = 404, description = "Resource not found", body = ErrorResponse),
        (status = 409, description = "Resource name taken", body = ErrorResponse)
    )
)]
pub(crate) async fn update_resource(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ResourceUpdateRequest>,
) -> Result<Json<Resource>, ApiError> {
    found(state.store.get_resource(id).await, "resource not found")?;
    if let Some(name) = &body.name {
        ensure_unique(
            state
                .store
                .find_resource_by_name(name)
                .await
                .map(|found| found.map(|resource| resource.id)),
            Some(id),
            &format!("resource '{name}' already exists"),
        )?;
    }
    let resource = state
        .store
        .update_resource(
            id,
            ResourcePatch {
                name: body.name,
                label: body.label,
            },
        )
        .await
        .map_err(|err| api_store_error("failed to update resource", err))?;
    Ok(Json(resource))
}

#[utoipa::path(
    delete,
    path = "/api/resources/{id}",
    tag = "rbac",
    params(("id" = i64, Path, description = "Resource id")),
    responses(
        (status = 204, description = "Resource deleted"),
        (status = 404, description = "Resource not found", body = ErrorResponse),
        (status = 409, description = "Resource still has permissions", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_resource(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    found(state.store.get_resource(id).await, "resource not found")?;
    let dependents = state
        .store
        .count_resource_permissions(id)
        .await
        .map_err(|err| api_internal("failed to count resource permissions", &err))?;
    if dependents > 0 {
        return Err(api_has_dependents("resource", dependents, "permissions"));
    }
    match state.store.delete_resource(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::Conflict(message)) => Err(api_conflict("has_dependents", &message)),
        Err(err) => Err(api_store_error("failed to delete resource", err)),
    }
}
