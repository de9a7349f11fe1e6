//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Lightweight, unauthenticated endpoints for probes and operators.
//!
//! # Key invariants and assumptions
//! - Health checks must be fast and side-effect free.
//! - System info is derived from in-memory state.
use crate::api::error::{ApiError, api_internal};
use crate::api::types::{HealthStatus, SystemInfo};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

pub const SERVICE_NAME: &str = "fleetadmin";

#[utoipa::path(
    get,
    path = "/system/info",
    tag = "system",
    responses(
        (status = 200, description = "Service identity and capabilities", body = SystemInfo)
    )
)]
/// Return service identity, storage backend and feature flags.
pub(crate) async fn system_info(State(state): State<AppState>) -> Json<SystemInfo> {
    Json(SystemInfo {
        service: SERVICE_NAME.to_string(),
        api_version: state.api_version.clone(),
        storage_backend: state.store.backend_name().to_string(),
        features: state.features.clone(),
    })
}

#[utoipa::path(
    get,
    path = "/system/health",
    tag = "system",
    responses(
        (status = 200, description = "Service health", body = HealthStatus),
        (status = 500, description = "Storage unavailable", body = crate::api::types::ErrorResponse)
    )
)]
/// Probe the backing store and return `ok` if it answers.
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, ApiError> {
    if let Err(err) = state.store.health_check().await {
        return Err(api_internal("storage unavailable", &err));
    }
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
    }))
}
