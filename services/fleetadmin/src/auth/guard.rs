//! Route guard: a tower layer that enforces one `(action, resource)` pair.
//!
//! # Purpose
//! Wraps a handler so that, before any handler code runs, the request is
//! authenticated from its session and checked against the live permission
//! graph. The resolved [`CurrentUser`] is attached to request extensions.
//!
//! # Security properties
//! - Missing or invalid sessions are rejected with 401.
//! - Authenticated users without the permission are rejected with 403.
//! - Decisions are logged with `user_id`, `action` and `resource`, never tokens.
//!
//! # Example
//! ```rust,ignore
//! use axum::handler::Handler;
//!
//! let route = axum::routing::get(
//!     api::sites::list_sites.layer(RequirePermission::read(&state, "sites")),
//! );
//! ```
use crate::api::error::{ApiError, api_forbidden, api_internal};
use crate::app::AppState;
use crate::auth::current_user::{CurrentUser, authenticate};
use crate::observability;
use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use fleet_authz::Action;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

#[derive(Clone)]
pub struct RequirePermission {
    state: AppState,
    action: Action,
    resource: &'static str,
}

impl RequirePermission {
    pub fn new(state: &AppState, action: Action, resource: &'static str) -> Self {
        Self {
            state: state.clone(),
            action,
            resource,
        }
    }

    pub fn read(state: &AppState, resource: &'static str) -> Self {
        Self::new(state, Action::Read, resource)
    }

    pub fn create(state: &AppState, resource: &'static str) -> Self {
        Self::new(state, Action::Create, resource)
    }

    pub fn update(state: &AppState, resource: &'static str) -> Self {
        Self::new(state, Action::Update, resource)
    }

    pub fn delete(state: &AppState, resource: &'static str) -> Self {
        Self::new(state, Action::Delete, resource)
    }
}

impl<S> Layer<S> for RequirePermission {
    type Service = RequirePermissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService {
            inner,
            guard: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequirePermissionService<S> {
    inner: S,
    guard: RequirePermission,
}

impl<S> Service<Request<Body>> for RequirePermissionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        // Take the service that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let guard = self.guard.clone();
        Box::pin(async move {
            let decision =
                authorize(&guard.state, req.headers(), guard.action, guard.resource).await;
            match decision {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    inner.call(req).await
                }
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}

/// Authenticate the request and check `(action, resource)` for the acting user.
pub async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    action: Action,
    resource: &str,
) -> Result<CurrentUser, ApiError> {
    let user = match authenticate(state, headers).await {
        Ok(user) => user,
        Err(err) => {
            tracing::debug!(%action, resource, "authz denied: not authenticated");
            observability::record_authz_decision("unauthenticated");
            return Err(err);
        }
    };
    let allowed = state
        .resolver
        .has_permission(user.id, action, resource)
        .await
        .map_err(|err| api_internal("failed to resolve permissions", &err))?;
    if !allowed {
        tracing::info!(user_id = user.id, %action, resource, "authz denied: permission missing");
        observability::record_authz_decision("deny");
        return Err(api_forbidden("insufficient permissions"));
    }
    tracing::debug!(user_id = user.id, %action, resource, "authz allowed");
    observability::record_authz_decision("allow");
    Ok(user)
}
