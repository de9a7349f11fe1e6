//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint returns the
//! same `{code, message, request_id}` body.
//!
//! # Key invariants and assumptions
//! - Error responses include a stable `code` and a human-readable `message`.
//! - Status codes align with the error category:
//!   400 `validation_error`, 401 `unauthorized`, 403 `forbidden`,
//!   404 `not_found`, 409 `already_exists`/`has_dependents`, 500 `internal`.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers and the route guard.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use fleetadmin::api::error::api_not_found;
///
/// let err = api_not_found("role not found");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// assert_eq!(err.body.code, "not_found");
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code: code.to_string(),
                message: message.to_string(),
                request_id: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        api_validation_error(&rejection.body_text())
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 409 Conflict error with a caller-provided code.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    ApiError::new(StatusCode::CONFLICT, code, message)
}

/// 409 `already_exists` for a natural-key collision.
pub fn api_already_exists(message: &str) -> ApiError {
    api_conflict("already_exists", message)
}

/// 409 `has_dependents` naming how many records block the delete.
///
/// ```rust
/// use fleetadmin::api::error::api_has_dependents;
///
/// let err = api_has_dependents("resource", 2, "permissions");
/// assert_eq!(err.body.message, "resource is referenced by 2 permissions");
/// ```
pub fn api_has_dependents(kind: &str, count: i64, dependents: &str) -> ApiError {
    api_conflict(
        "has_dependents",
        &format!("{kind} is referenced by {count} {dependents}"),
    )
}

/// Build a 500 error from a store error.
///
/// The store error is logged; the client only sees `message`.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "fleetadmin storage error");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    ApiError::new(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Map a store error from a write or lookup to the matching HTTP error.
///
/// `NotFound` keeps the store's entity name, `Conflict` becomes
/// `already_exists`, anything else is a logged 500 with `context` as message.
pub fn api_store_error(context: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(what) => api_not_found(&format!("{what} not found")),
        StoreError::Conflict(message) => api_already_exists(&message),
        other @ StoreError::Unexpected(_) => api_internal(context, &other),
    }
}
