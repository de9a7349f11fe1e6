//! Request-body validation.
//!
//! [`ValidatedJson`] deserializes a JSON body and runs its `garde` rules, so
//! malformed JSON and rule violations both surface as 400 `validation_error`.
//! [`ApiPath`] and [`ApiQuery`] do the same for path and query parameters.
use crate::api::error::{ApiError, api_validation_error};
use async_trait::async_trait;
use axum::Json;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Request};
use garde::{Report, Validate};
use serde::de::DeserializeOwned;

/// JSON body that has passed its `garde` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    T::Context: Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        validate_struct(&value)?;
        Ok(Self(value))
    }
}

/// Path parameters whose parse failures use the canonical error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        api_validation_error(&rejection.body_text())
    }
}

/// Query-string parameters whose parse failures use the canonical error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        api_validation_error(&rejection.body_text())
    }
}

pub fn validate_struct<T>(value: &T) -> Result<(), ApiError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| api_validation_error(&format_validation_errors(&report)))
}

/// Join report entries as `path: message`, comma separated.
fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
