//! Storage traits for the fleet-admin service.
//!
//! # Purpose
//! [`RbacStore`] covers users, roles, permissions, resources and their join
//! links plus the joins the permission resolver needs. [`FleetStore`] covers
//! sites and engins. Handlers depend on the combined [`AdminStore`].
//!
//! # Notes
//! Stores do not enforce dependent-count rules themselves; handlers check
//! counts first and a durable backend's foreign keys surface races as
//! [`StoreError::Conflict`].
use crate::model::{
    Engin, EnginPatch, NewEngin, NewPermission, NewResource, NewRole, NewSite, NewUser,
    Permission, PermissionPatch, Resource, ResourcePatch, Role, RolePatch, RolePermission, Site,
    SitePatch, User, UserCredentials, UserRole,
};
use async_trait::async_trait;
use fleet_authz::{Action, PermissionKey};
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an idempotent link insert: the link and whether it was new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linked<T> {
    pub link: T,
    pub created: bool,
}

#[async_trait]
pub trait RbacStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: i64) -> StoreResult<User>;
    async fn find_user_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn count_users(&self) -> StoreResult<i64>;

    async fn list_resources(&self) -> StoreResult<Vec<Resource>>;
    async fn get_resource(&self, id: i64) -> StoreResult<Resource>;
    async fn find_resource_by_name(&self, name: &str) -> StoreResult<Option<Resource>>;
    async fn create_resource(&self, resource: NewResource) -> StoreResult<Resource>;
    async fn update_resource(&self, id: i64, patch: ResourcePatch) -> StoreResult<Resource>;
    async fn delete_resource(&self, id: i64) -> StoreResult<()>;
    async fn count_resource_permissions(&self, id: i64) -> StoreResult<i64>;

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>>;
    async fn get_permission(&self, id: i64) -> StoreResult<Permission>;
    async fn find_permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>>;
    async fn create_permission(&self, permission: NewPermission) -> StoreResult<Permission>;
    async fn update_permission(&self, id: i64, patch: PermissionPatch)
    -> StoreResult<Permission>;
    async fn delete_permission(&self, id: i64) -> StoreResult<()>;
    async fn count_permission_roles(&self, id: i64) -> StoreResult<i64>;
    async fn attach_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> StoreResult<Linked<RolePermission>>;
    async fn detach_permission(&self, role_id: i64, permission_id: i64) -> StoreResult<()>;

    async fn list_roles(&self) -> StoreResult<Vec<Role>>;
    async fn get_role(&self, id: i64) -> StoreResult<Role>;
    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    async fn create_role(&self, role: NewRole) -> StoreResult<Role>;
    async fn update_role(&self, id: i64, patch: RolePatch) -> StoreResult<Role>;
    async fn delete_role(&self, id: i64) -> StoreResult<()>;
    async fn count_role_users(&self, id: i64) -> StoreResult<i64>;
    async fn role_permissions(&self, role_id: i64) -> StoreResult<Vec<Permission>>;

    async fn list_user_roles(&self) -> StoreResult<Vec<UserRole>>;
    async fn assign_role(&self, user_id: i64, role_id: i64) -> StoreResult<Linked<UserRole>>;
    async fn delete_user_role(&self, id: i64) -> StoreResult<()>;

    /// Roles linked to the user; empty for unknown users.
    async fn user_roles(&self, user_id: i64) -> StoreResult<Vec<Role>>;
    /// Flattened `action:resource` keys reachable through the user's roles.
    async fn user_permission_keys(&self, user_id: i64) -> StoreResult<Vec<PermissionKey>>;
    /// Single existence check across user → role → permission → resource.
    async fn user_has_permission(
        &self,
        user_id: i64,
        action: Action,
        resource: &str,
    ) -> StoreResult<bool>;
    async fn user_has_role(&self, user_id: i64, role_name: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait FleetStore: Send + Sync {
    async fn list_sites(&self) -> StoreResult<Vec<Site>>;
    async fn get_site(&self, id: i64) -> StoreResult<Site>;
    async fn find_site_by_name(&self, name: &str) -> StoreResult<Option<Site>>;
    async fn create_site(&self, site: NewSite) -> StoreResult<Site>;
    async fn update_site(&self, id: i64, patch: SitePatch) -> StoreResult<Site>;
    async fn delete_site(&self, id: i64) -> StoreResult<()>;
    async fn count_site_engins(&self, id: i64) -> StoreResult<i64>;

    async fn list_engins(&self, site_id: Option<i64>) -> StoreResult<Vec<Engin>>;
    async fn get_engin(&self, id: i64) -> StoreResult<Engin>;
    async fn find_engin_by_code(&self, code: &str) -> StoreResult<Option<Engin>>;
    async fn create_engin(&self, engin: NewEngin) -> StoreResult<Engin>;
    async fn update_engin(&self, id: i64, patch: EnginPatch) -> StoreResult<Engin>;
    async fn delete_engin(&self, id: i64) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

pub trait AdminStore: RbacStore + FleetStore {}

impl<T> AdminStore for T where T: RbacStore + FleetStore {}
