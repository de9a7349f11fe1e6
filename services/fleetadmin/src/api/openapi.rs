//! OpenAPI schema aggregation for the fleet-admin API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document served
//! at `/openapi.json` and rendered by Swagger UI at `/docs`.
use crate::api::{
    auth, engins, permissions, resources, roles, sites, system, user_roles, users,
    types::{
        AuthPermissionsResponse, AuthRolesResponse, EnginCreateRequest, EnginListResponse,
        EnginUpdateRequest, ErrorResponse, FeatureFlags, HealthStatus, LoginRequest,
        LoginResponse, MeResponse, PermissionCreateRequest, PermissionListResponse,
        PermissionUpdateRequest, RegisterRequest, ResourceCreateRequest, ResourceListResponse,
        ResourceUpdateRequest, RoleCreateRequest, RoleListResponse, RolePermissionResponse,
        RoleUpdateRequest, SiteCreateRequest, SiteListResponse, SiteUpdateRequest, SystemInfo,
        UserListResponse, UserRoleCreateRequest, UserRoleListResponse,
    },
};
use crate::model::{
    Engin, EnginStatus, Permission, Resource, Role, RoleDetail, RolePermission, Site, User,
    UserRole,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "fleetadmin",
        version = "v1",
        description = "Fleet maintenance administration API"
    ),
    paths(
        system::system_info,
        system::system_health,
        resources::list_resources,
        resources::get_resource,
        resources::create_resource,
        resources::update_resource,
        resources::delete_resource,
        permissions::list_permissions,
        permissions::get_permission,
        permissions::create_permission,
        permissions::update_permission,
        permissions::delete_permission,
        permissions::attach_to_role,
        permissions::detach_from_role,
        roles::list_roles,
        roles::get_role,
        roles::create_role,
        roles::update_role,
        roles::delete_role,
        user_roles::list_user_roles,
        user_roles::create_user_role,
        user_roles::delete_user_role,
        users::list_users,
        auth::my_permissions,
        auth::my_roles,
        auth::me,
        auth::login,
        auth::register,
        auth::logout,
        sites::list_sites,
        sites::get_site,
        sites::create_site,
        sites::update_site,
        sites::delete_site,
        engins::list_engins,
        engins::get_engin,
        engins::create_engin,
        engins::update_engin,
        engins::delete_engin
    ),
    components(schemas(
        SystemInfo,
        FeatureFlags,
        HealthStatus,
        ErrorResponse,
        Resource,
        ResourceCreateRequest,
        ResourceUpdateRequest,
        ResourceListResponse,
        Permission,
        PermissionCreateRequest,
        PermissionUpdateRequest,
        PermissionListResponse,
        RolePermission,
        RolePermissionResponse,
        Role,
        RoleDetail,
        RoleCreateRequest,
        RoleUpdateRequest,
        RoleListResponse,
        UserRole,
        UserRoleCreateRequest,
        UserRoleListResponse,
        User,
        UserListResponse,
        RegisterRequest,
        LoginRequest,
        LoginResponse,
        MeResponse,
        AuthPermissionsResponse,
        AuthRolesResponse,
        Site,
        SiteCreateRequest,
        SiteUpdateRequest,
        SiteListResponse,
        Engin,
        EnginStatus,
        EnginCreateRequest,
        EnginUpdateRequest,
        EnginListResponse
    )),
    tags(
        (name = "system", description = "Health and service metadata"),
        (name = "auth", description = "Sessions and the caller's own permissions"),
        (name = "rbac", description = "Resources, permissions, roles and assignments"),
        (name = "fleet", description = "Sites and engins")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_guarded_and_public_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/system/health",
            "/api/resources/{id}",
            "/api/permissions/{id}/roles/{role_id}",
            "/api/user-roles",
            "/api/auth/login",
            "/api/engins",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
