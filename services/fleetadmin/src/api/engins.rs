//! Engin (equipment) API handlers.
//!
//! Engins belong to a site; the site must exist on create and on a site move.
//! Listing accepts an optional `siteId` filter.
use crate::api::error::{ApiError, api_internal, api_store_error};
use crate::api::types::{
    EnginCreateRequest, EnginListQuery, EnginListResponse, EnginUpdateRequest, ErrorResponse,
};
use crate::api::validate::{ApiPath, ApiQuery, ValidatedJson};
use crate::api::{ensure_unique, found};
use crate::app::AppState;
use crate::model::{Engin, EnginPatch, NewEngin};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

#[utoipa::path(
    get,
    path = "/api/engins",
    tag = "fleet",
    params(EnginListQuery),
    responses(
        (status = 200, description = "List engins", body = EnginListResponse),
        (status = 400, description = "Malformed query", body = ErrorResponse),
        (status = 403, description = "Missing read:engins", body = ErrorResponse)
    )
)]
pub(crate) async fn list_engins(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EnginListQuery>,
) -> Result<Json<EnginListResponse>, ApiError> {
    let items = state
        .store
        .list_engins(query.site_id)
        .await
        .map_err(|err| api_internal("failed to list engins", &err))?;
    Ok(Json(EnginListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/engins/{id}",
    tag = "fleet",
    params(("id" = i64, Path, description = "Engin id")),
    responses(
        (status = 200, description = "Engin", body = Engin),
        (status = 404, description = "Engin not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_engin(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<Json<Engin>, ApiError> {
    Ok(Json(found(state.store.get_engin(id).await, "engin not found")?))
}

#[utoipa::path(
    post,
    path = "/api/engins",
    tag = "fleet",
    request_body = EnginCreateRequest,
    responses(
        (status = 201, description = "Engin created", body = Engin),
        (status = 404, description = "Site not found", body = ErrorResponse),
        (status = 409, description = "Engin code taken", body = ErrorResponse)
    )
)]
pub(crate) async fn create_engin(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<EnginCreateRequest>,
) -> Result<(StatusCode, Json<Engin>), ApiError> {
    found(state.store.get_site(body.site_id).await, "site not found")?;
    ensure_unique(
        state
            .store
            .find_engin_by_code(&body.code)
            .await
            .map(|found| found.map(|engin| engin.id)),
        None,
        &format!("engin '{}' already exists", body.code),
    )?;
    let engin = state
        .store
        .create_engin(NewEngin {
            code: body.code,
            label: body.label,
            site_id: body.site_id,
            status: body.status.unwrap_or_default(),
        })
        .await
        .map_err(|err| api_store_error("failed to create engin", err))?;
    tracing::info!(engin_id = engin.id, site_id = engin.site_id, "engin created");
    Ok((StatusCode::CREATED, Json(engin)))
}

#[utoipa::path(
    put,
    path = "/api/engins/{id}",
    tag = "fleet",
    params(("id" = i64, Path, description = "Engin id")),
    request_body = EnginUpdateRequest,
    responses(
        (status = 200, description = "Engin updated", body = Engin),
        (status = 404, description = "Engin or site not found", body = ErrorResponse),
        (status = 409, description = "Engin code taken", body = ErrorResponse)
    )
)]
pub(crate) async fn update_engin(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<EnginUpdateRequest>,
) -> Result<Json<Engin>, ApiError> {
    found(state.store.get_engin(id).await, "engin not found")?;
    if let Some(site_id) = body.site_id {
        found(state.store.get_site(site_id).await, "site not found")?;
    }
    if let Some(code) = &body.code {
        ensure_unique(
            state
                .store
                .find_engin_by_code(code)
                .await
                .map(|found| found.map(|engin| engin.id)),
            Some(id),
            &format!("engin '{code}' already exists"),
        )?;
    }
    let engin = state
        .store
        .update_engin(
            id,
            EnginPatch {
                code: body.code,
                label: body.label,
                site_id: body.site_id,
                status: body.status,
            },
        )
        .await
        .map_err(|err| api_store_error("failed to update engin", err))?;
    Ok(Json(engin))
}

#[utoipa::path(
    delete,
    path = "/api/engins/{id}",
    tag = "fleet",
    params(("id" = i64, Path, description = "Engin id")),
    responses(
        (status = 204, description = "Engin deleted"),
        (status = 404, description = "Engin not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_engin(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete_engin(id)
        .await
        .map_err(|err| api_store_error("failed to delete engin", err))?;
    Ok(StatusCode::NO_CONTENT)
}
