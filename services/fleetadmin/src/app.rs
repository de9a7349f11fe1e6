//! Fleet-admin HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, attaches a permission guard to every protected
//! method, and defines the shared state injected into handlers.
//!
//! # Notes
//! Guards are attached per method, not per path: `GET /api/sites` needs
//! `read:sites` while `POST /api/sites` needs `create:sites`.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::api::types::FeatureFlags;
use crate::auth::session::SessionKeys;
use crate::auth::{PermissionResolver, RequirePermission};
use crate::config::SessionConfig;
use crate::observability;
use crate::store::AdminStore;
use axum::Router;
use axum::handler::Handler;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

pub const API_VERSION: &str = "v1";

pub const RESOURCES: &str = "resources";
pub const PERMISSIONS: &str = "permissions";
pub const ROLES: &str = "roles";
pub const USER_ROLES: &str = "user_roles";
pub const USERS: &str = "users";
pub const SITES: &str = "sites";
pub const ENGINS: &str = "engins";

/// Resource names the route guards check, seeded into the catalog at startup.
pub const GUARDED_RESOURCES: [&str; 7] = [
    RESOURCES,
    PERMISSIONS,
    ROLES,
    USER_ROLES,
    USERS,
    SITES,
    ENGINS,
];

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub features: FeatureFlags,
    pub store: Arc<dyn AdminStore + Send + Sync>,
    pub sessions: SessionKeys,
    pub resolver: PermissionResolver,
}

impl AppState {
    pub fn new(store: Arc<dyn AdminStore + Send + Sync>, session: &SessionConfig) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            features: FeatureFlags {
                durable_storage: store.is_durable(),
            },
            resolver: PermissionResolver::new(store.clone()),
            sessions: SessionKeys::new(session),
            store,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });
    let s = &state;

    Router::new()
        .route("/system/info", get(api::system::system_info))
        .route("/system/health", get(api::system::system_health))
        .route(
            "/api/resources",
            get(api::resources::list_resources.layer(RequirePermission::read(s, RESOURCES)))
                .post(
                    api::resources::create_resource
                        .layer(RequirePermission::create(s, RESOURCES)),
                ),
        )
        .route(
            "/api/resources/:id",
            get(api::resources::get_resource.layer(RequirePermission::read(s, RESOURCES)))
                .put(
                    api::resources::update_resource
                        .layer(RequirePermission::update(s, RESOURCES)),
                )
                .delete(
                    api::resources::delete_resource
                        .layer(RequirePermission::delete(s, RESOURCES)),
                ),
        )
        .route(
            "/api/permissions",
            get(api::permissions::list_permissions.layer(RequirePermission::read(s, PERMISSIONS)))
                .post(
                    api::permissions::create_permission
                        .layer(RequirePermission::create(s, PERMISSIONS)),
                ),
        )
        .route(
            "/api/permissions/:id",
            get(api::permissions::get_permission.layer(RequirePermission::read(s, PERMISSIONS)))
                .put(
                    api::permissions::update_permission
                        .layer(RequirePermission::update(s, PERMISSIONS)),
                )
                .delete(
                    api::permissions::delete_permission
                        .layer(RequirePermission::delete(s, PERMISSIONS)),
                ),
        )
        .route(
            "/api/permissions/:id/roles/:role_id",
            post(
                api::permissions::attach_to_role.layer(RequirePermission::update(s, PERMISSIONS)),
            )
            .delete(
                api::permissions::detach_from_role
                    .layer(RequirePermission::update(s, PERMISSIONS)),
            ),
        )
        .route(
            "/api/roles",
            get(api::roles::list_roles.layer(RequirePermission::read(s, ROLES)))
                .post(api::roles::create_role.layer(RequirePermission::create(s, ROLES))),
        )
        .route(
            "/api/roles/:id",
            get(api::roles::get_role.layer(RequirePermission::read(s, ROLES)))
                .put(api::roles::update_role.layer(RequirePermission::update(s, ROLES)))
                .delete(api::roles::delete_role.layer(RequirePermission::delete(s, ROLES))),
        )
        .route(
            "/api/user-roles",
            get(api::user_roles::list_user_roles.layer(RequirePermission::read(s, USER_ROLES)))
                .post(
                    api::user_roles::create_user_role
                        .layer(RequirePermission::create(s, USER_ROLES)),
                ),
        )
        .route(
            "/api/user-roles/:id",
            axum::routing::delete(
                api::user_roles::delete_user_role.layer(RequirePermission::delete(s, USER_ROLES)),
            ),
        )
        .route(
            "/api/users",
            get(api::users::list_users.layer(RequirePermission::read(s, USERS))),
        )
        .route("/api/auth/permissions", get(api::auth::my_permissions))
        .route("/api/auth/roles", get(api::auth::my_roles))
        .route("/api/auth/me", get(api::auth::me))
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/logout", post(api::auth::logout))
        .route(
            "/api/sites",
            get(api::sites::list_sites.layer(RequirePermission::read(s, SITES)))
                .post(api::sites::create_site.layer(RequirePermission::create(s, SITES))),
        )
        .route(
            "/api/sites/:id",
            get(api::sites::get_site.layer(RequirePermission::read(s, SITES)))
                .put(api::sites::update_site.layer(RequirePermission::update(s, SITES)))
                .delete(api::sites::delete_site.layer(RequirePermission::delete(s, SITES))),
        )
        .route(
            "/api/engins",
            get(api::engins::list_engins.layer(RequirePermission::read(s, ENGINS)))
                .post(api::engins::create_engin.layer(RequirePermission::create(s, ENGINS))),
        )
        .route(
            "/api/engins/:id",
            get(api::engins::get_engin.layer(RequirePermission::read(s, ENGINS)))
                .put(api::engins::update_engin.layer(RequirePermission::update(s, ENGINS)))
                .delete(api::engins::delete_engin.layer(RequirePermission::delete(s, ENGINS))),
        )
        .merge(utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(trace_layer)
        .with_state(state)
}
