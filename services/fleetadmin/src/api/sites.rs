//! Site API handlers.
use crate::api::error::{
    ApiError, api_conflict, api_has_dependents, api_internal, api_store_error,
};
use crate::api::types::{ErrorResponse, SiteCreateRequest, SiteListResponse, SiteUpdateRequest};
use crate::api::validate::{ApiPath, ValidatedJson};
use crate::api::{ensure_unique, found};
use crate::app::AppState;
use crate::model::{NewSite, Site, SitePatch};
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

#[utoipa::path(
    get,
    path = "/api/sites",
    tag = "fleet",
    responses(
        (status = 200, description = "List sites", body = SiteListResponse),
        (status = 403, description = "Missing read:sites", body = ErrorResponse)
    )
)]
pub(crate) async fn list_sites(
    State(state): State<AppState>,
) -> Result<Json<SiteListResponse>, ApiError> {
    let items = state
        .store
        .list_sites()
        .await
        .map_err(|err| api_internal("failed to list sites", &err))?;
    Ok(Json(SiteListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/sites/{id}",
    tag = "fleet",
    params(("id" = i64, Path, description = "Site id")),
    responses(
        (status = 200, description = "Site", body = Site),
        (status = 404, description = "Site not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_site(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<Json<Site>, ApiError> {
    Ok(Json(found(state.store.get_site(id).await, "site not found")?))
}

#[utoipa::path(
    post,
    path = "/api/sites",
    tag = "fleet",
    request_body = SiteCreateRequest,
    responses(
        (status = 201, description = "Site created", body = Site),
        (status = 409, description = "Site name taken", body = ErrorResponse)
    )
)]
pub(crate) async fn create_site(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SiteCreateRequest>,
) -> Result<(StatusCode, Json<Site>), ApiError> {
    ensure_unique(
        state
            .store
            .find_site_by_name(&body.name)
            .await
            .map(|found| found.map(|site| site.id)),
        None,
        &format!("site '{}' already exists", body.name),
    )?;
    let site = state
        .store
        .create_site(NewSite {
            name: body.name,
            location: body.location,
            description: body.description,
        })
        .await
        .map_err(|err| api_store_error("failed to create site", err))?;
    tracing::info!(site_id = site.id, "site created");
    Ok((StatusCode::CREATED, Json(site)))
}

#[utoipa::path(
    put,
    path = "/api/sites/{id}",
    tag = "fleet",
    params(("id" = i64, Path, description = "Site id")),
    request_body = SiteUpdateRequest,
    responses(
        (status = 200, description = "Site updated", body = Site),
        (status = 404, description = "Site not found", body = ErrorResponse),
        (status = 409, description = "Site name taken", body = ErrorResponse)
    )
)]
pub(crate) async fn update_site(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SiteUpdateRequest>,
) -> Result<Json<Site>, ApiError> {
    found(state.store.get_site(id).await, "site not found")?;
    if let Some(name) = &body.name {
        ensure_unique(
            state
                .store
                .find_site_by_name(name)
                .await
                .map(|found| found.map(|site| site.id)),
            Some(id),
            &format!("site '{name}' already exists"),
        )?;
    }
    let site = state
        .store
        .update_site(
            id,
            SitePatch {
                name: body.name,
                location: body.location,
                description: body.description,
            },
        )
        .await
        .map_err(|err| api_store_error("failed to update site", err))?;
    Ok(Json(site))
}

#[utoipa::path(
    delete,
    path = "/api/sites/{id}",
    tag = "fleet",
    params(("id" = i64, Path, description = "Site id")),
    responses(
        (status = 204, description = "Site deleted"),
        (status = 404, description = "Site not found", body = ErrorResponse),
        (status = 409, description = "Site still has engins", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_site(
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    found(state.store.get_site(id).await, "site not found")?;
    let dependents = state
        .store
        .count_site_engins(id)
        .await
        .map_err(|err| api_internal("failed to count site engins", &err))?;
    if dependents > 0 {
        return Err(api_has_dependents("site", dependents, "engins"));
    }
    match state.store.delete_site(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::Conflict(message)) => Err(api_conflict("has_dependents", &message)),
        Err(err) => Err(api_store_error("failed to delete site", err)),
    }
}
