//! Fleet-admin HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and the shared checks handlers run before
//! writes: natural-key uniqueness and referenced-record existence.
pub mod auth;
pub mod engins;
pub mod error;
pub mod openapi;
pub mod permissions;
pub mod resources;
pub mod roles;
pub mod sites;
pub mod system;
pub mod types;
pub mod user_roles;
pub mod users;
pub mod validate;

use crate::api::error::{ApiError, api_already_exists, api_internal, api_not_found};
use crate::store::{StoreError, StoreResult};

/// Reject a natural key already held by another record.
///
/// `found` is the id of the record currently holding the key, if any;
/// `except` is the record being renamed, which may keep its own key.
pub(crate) fn ensure_unique(
    found: StoreResult<Option<i64>>,
    except: Option<i64>,
    message: &str,
) -> Result<(), ApiError> {
    match found {
        Ok(Some(id)) if Some(id) != except => Err(api_already_exists(message)),
        Ok(_) => Ok(()),
        Err(err) => Err(api_internal("failed to check uniqueness", &err)),
    }
}

/// Turn a lookup result into the record or a 404 with `message`.
pub(crate) fn found<T>(result: StoreResult<T>, message: &str) -> Result<T, ApiError> {
    match result {
        Ok(value) => Ok(value),
        Err(StoreError::NotFound(_)) => Err(api_not_found(message)),
        Err(err) => Err(api_internal("failed to load record", &err)),
    }
}

/// Fail with 404 when any of `ids` does not name a permission.
pub(crate) async fn ensure_permissions_exist(
    state: &crate::app::AppState,
    ids: &[i64],
) -> Result<(), ApiError> {
    for id in ids {
        found(
            state.store.get_permission(*id).await,
            &format!("permission {id} not found"),
        )?;
    }
    Ok(())
}
