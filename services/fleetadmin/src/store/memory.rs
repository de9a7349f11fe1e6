//! In-memory implementation of the fleet-admin store.
//!
//! # Purpose
//! Implements [`RbacStore`] and [`FleetStore`] with ordered maps guarded by a
//! single `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - demo deployments where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - All tables sit behind one lock so join queries (user → role → permission
//!   → resource) observe a consistent picture and writers never interleave.
//! - Ids are assigned from per-table counters starting at 1 and never reused.
//!
//! # Referential behavior
//! Deleting a record removes the join links that point at it, mirroring the
//! `ON DELETE CASCADE` clauses of the durable schema. Resources still named by
//! a permission and sites still holding engins are refused with
//! [`StoreError::Conflict`], like the `RESTRICT` keys there.
use super::{FleetStore, Linked, RbacStore, StoreError, StoreResult};
use crate::model::{
    Engin, EnginPatch, NewEngin, NewPermission, NewResource, NewRole, NewSite, NewUser,
    Permission, PermissionPatch, Resource, ResourcePatch, Role, RolePatch, RolePermission, Site,
    SitePatch, User, UserCredentials, UserRole,
};
use async_trait::async_trait;
use fleet_authz::{Action, PermissionKey};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered table with a monotonically increasing id counter.
#[derive(Debug)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(i64) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn values(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: Table<UserCredentials>,
    resources: Table<Resource>,
    permissions: Table<Permission>,
    roles: Table<Role>,
    user_roles: Table<UserRole>,
    role_permissions: Table<RolePermission>,
    sites: Table<Site>,
    engins: Table<Engin>,
}

impl Tables {
    fn role_ids_for_user(&self, user_id: i64) -> BTreeSet<i64> {
        self.user_roles
            .rows
            .values()
            .filter(|link| link.user_id == user_id)
            .map(|link| link.role_id)
            .collect()
    }

    fn permission_ids_for_roles(&self, role_ids: &BTreeSet<i64>) -> BTreeSet<i64> {
        self.role_permissions
            .rows
            .values()
            .filter(|link| role_ids.contains(&link.role_id))
            .map(|link| link.permission_id)
            .collect()
    }

    fn replace_role_links(&mut self, role_id: i64, permission_ids: &[i64]) {
        self.role_permissions
            .rows
            .retain(|_, link| link.role_id != role_id);
        let unique: BTreeSet<i64> = permission_ids.iter().copied().collect();
        for permission_id in unique {
            self.role_permissions.insert_with(|id| RolePermission {
                id,
                role_id,
                permission_id,
            });
        }
    }

    fn name_taken<T>(
        table: &Table<T>,
        name: &str,
        except: Option<i64>,
        key: impl Fn(&T) -> &str,
    ) -> bool {
        table
            .rows
            .iter()
            .any(|(id, row)| key(row) == name && Some(*id) != except)
    }
}

/// In-memory fleet-admin store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RbacStore for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if Tables::name_taken(&tables.users, &user.email, None, |row| &row.user.email) {
            return Err(StoreError::Conflict("user email exists".into()));
        }
        let created = tables.users.insert_with(|id| UserCredentials {
            user: User {
                id,
                email: user.email,
                name: user.name,
                created_at: chrono::Utc::now(),
            },
            password_hash: user.password_hash,
            salt: user.salt,
        });
        Ok(created.user)
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        self.tables
            .read()
            .await
            .users
            .rows
            .get(&id)
            .map(|row| row.user.clone())
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn find_user_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .rows
            .values()
            .find(|row| row.user.email == email)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .rows
            .values()
            .map(|row| row.user.clone())
            .collect())
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.users.rows.len() as i64)
    }

    async fn list_resources(&self) -> StoreResult<Vec<Resource>> {
        Ok(self.tables.read().await.resources.values())
    }

    async fn get_resource(&self, id: i64) -> StoreResult<Resource> {
        self.tables
            .read()
            .await
            .resources
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("resource".into()))
    }

    async fn find_resource_by_name(&self, name: &str) -> StoreResult<Option<Resource>> {
        Ok(self
            .tables
            .read()
            .await
            .resources
            .rows
            .values()
            .find(|row| row.name == name)
            .cloned())
    }

    async fn create_resource(&self, resource: NewResource) -> StoreResult<Resource> {
        let mut tables = self.tables.write().await;
        if Tables::name_taken(&tables.resources, &resource.name, None, |row| &row.name) {
            return Err(StoreError::Conflict("resource exists".into()));
        }
        Ok(tables.resources.insert_with(|id| Resource {
            id,
            name: resource.name,
            label: resource.label,
        }))
    }

    async fn update_resource(&self, id: i64, patch: ResourcePatch) -> StoreResult<Resource> {
        let mut tables = self.tables.write().await;
        if let Some(name) = &patch.name {
            if Tables::name_taken(&tables.resources, name, Some(id), |row| &row.name) {
                return Err(StoreError::Conflict("resource exists".into()));
            }
        }
        let row = tables
            .resources
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("resource".into()))?;
        if let Some(name) = patch.name {
            row.name = name;
        }
        if let Some(label) = patch.label {
            row.label = label;
        }
        Ok(row.clone())
    }

    async fn delete_resource(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.resources.rows.contains_key(&id) {
            return Err(StoreError::NotFound("resource".into()));
        }
        if tables
            .permissions
            .rows
            .values()
            .any(|row| row.resource_id == id)
        {
            return Err(StoreError::Conflict(
                "resource is referenced by permissions".into(),
            ));
        }
        tables.resources.rows.remove(&id);
        Ok(())
    }

    async fn count_resource_permissions(&self, id: i64) -> StoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .permissions
            .rows
            .values()
            .filter(|row| row.resource_id == id)
            .count() as i64)
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        Ok(self.tables.read().await.permissions.values())
    }

    async fn get_permission(&self, id: i64) -> StoreResult<Permission> {
        self.tables
            .read()
            .await
            .permissions
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("permission".into()))
    }

    async fn find_permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        Ok(self
            .tables
            .read()
            .await
            .permissions
            .rows
            .values()
            .find(|row| row.name == name)
            .cloned())
    }

    async fn create_permission(&self, permission: NewPermission) -> StoreResult<Permission> {
        let mut tables = self.tables.write().await;
        if !tables.resources.rows.contains_key(&permission.resource_id) {
            return Err(StoreError::NotFound("resource".into()));
        }
        if Tables::name_taken(&tables.permissions, &permission.name, None, |row| &row.name) {
            return Err(StoreError::Conflict("permission exists".into()));
        }
        Ok(tables.permissions.insert_with(|id| Permission {
            id,
            name: permission.name,
            resource_id: permission.resource_id,
            action: permission.action,
            description: permission.description,
        }))
    }

    async fn update_permission(
        &self,
        id: i64,
        patch: PermissionPatch,
    ) -> StoreResult<Permission> {
        let mut tables = self.tables.write().await;
        if let Some(resource_id) = patch.resource_id {
            if !tables.resources.rows.contains_key(&resource_id) {
                return Err(StoreError::NotFound("resource".into()));
            }
        }
        if let Some(name) = &patch.name {
            if Tables::name_taken(&tables.permissions, name, Some(id), |row| &row.name) {
                return Err(StoreError::Conflict("permission exists".into()));
            }
        }
        let row = tables
            .permissions
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("permission".into()))?;
        if let Some(name) = patch.name {
            row.name = name;
        }
        if let Some(resource_id) = patch.resource_id {
            row.resource_id = resource_id;
        }
        if let Some(action) = patch.action {
            row.action = action;
        }
        if let Some(description) = patch.description {
            row.description = description;
        }
        Ok(row.clone())
    }

    async fn delete_permission(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.permissions.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("permission".into()));
        }
        tables
            .role_permissions
            .rows
            .retain(|_, link| link.permission_id != id);
        Ok(())
    }

    async fn count_permission_roles(&self, id: i64) -> StoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .role_permissions
            .rows
            .values()
            .filter(|link| link.permission_id == id)
            .count() as i64)
    }

    async fn attach_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> StoreResult<Linked<RolePermission>> {
        let mut tables = self.tables.write().await;
        if !tables.roles.rows.contains_key(&role_id) {
            return Err(StoreError::NotFound("role".into()));
        }
        if !tables.permissions.rows.contains_key(&permission_id) {
            return Err(StoreError::NotFound("permission".into()));
        }
        if let Some(existing) = tables
            .role_permissions
            .rows
            .values()
            .find(|link| link.role_id == role_id && link.permission_id == permission_id)
        {
            return Ok(Linked {
                link: existing.clone(),
                created: false,
            });
        }
        let link = tables.role_permissions.insert_with(|id| RolePermission {
            id,
            role_id,
            permission_id,
        });
        Ok(Linked {
            link,
            created: true,
        })
    }

    async fn detach_permission(&self, role_id: i64, permission_id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.role_permissions.rows.len();
        tables
            .role_permissions
            .rows
            .retain(|_, link| !(link.role_id == role_id && link.permission_id == permission_id));
        if tables.role_permissions.rows.len() == before {
            return Err(StoreError::NotFound("role permission".into()));
        }
        Ok(())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(self.tables.read().await.roles.values())
    }

    async fn get_role(&self, id: i64) -> StoreResult<Role> {
        self.tables
            .read()
            .await
            .roles
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("role".into()))
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(self
            .tables
            .read()
            .await
            .roles
            .rows
            .values()
            .find(|row| row.name == name)
            .cloned())
    }

    async fn create_role(&self, role: NewRole) -> StoreResult<Role> {
        let mut tables = self.tables.write().await;
        if Tables::name_taken(&tables.roles, &role.name, None, |row| &row.name) {
            return Err(StoreError::Conflict("role exists".into()));
        }
        if let Some(missing) = role
            .permission_ids
            .iter()
            .find(|id| !tables.permissions.rows.contains_key(id))
        {
            return Err(StoreError::NotFound(format!("permission {missing}")));
        }
        let created = tables.roles.insert_with(|id| Role {
            id,
            name: role.name,
            description: role.description,
        });
        tables.replace_role_links(created.id, &role.permission_ids);
        Ok(created)
    }

    async fn update_role(&self, id: i64, patch: RolePatch) -> StoreResult<Role> {
        let mut tables = self.tables.write().await;
        if !tables.roles.rows.contains_key(&id) {
            return Err(StoreError::NotFound("role".into()));
        }
        if let Some(name) = &patch.name {
            if Tables::name_taken(&tables.roles, name, Some(id), |row| &row.name) {
                return Err(StoreError::Conflict("role exists".into()));
            }
        }
        if let Some(permission_ids) = &patch.permission_ids {
            if let Some(missing) = permission_ids
                .iter()
                .find(|pid| !tables.permissions.rows.contains_key(pid))
            {
                return Err(StoreError::NotFound(format!("permission {missing}")));
            }
            tables.replace_role_links(id, permission_ids);
        }
        let row = tables
            .roles
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("role".into()))?;
        if let Some(name) = patch.name {
            row.name = name;
        }
        if let Some(description) = patch.description {
            row.description = description;
        }
        Ok(row.clone())
    }

    async fn delete_role(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.roles.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("role".into()));
        }
        tables.role_permissions.rows.retain(|_, link| link.role_id != id);
        tables.user_roles.rows.retain(|_, link| link.role_id != id);
        Ok(())
    }

    async fn count_role_users(&self, id: i64) -> StoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .user_roles
            .rows
            .values()
            .filter(|link| link.role_id == id)
            .count() as i64)
    }

    async fn role_permissions(&self, role_id: i64) -> StoreResult<Vec<Permission>> {
        let tables = self.tables.read().await;
        let ids = tables.permission_ids_for_roles(&BTreeSet::from([role_id]));
        Ok(ids
            .iter()
            .filter_map(|id| tables.permissions.rows.get(id).cloned())
            .collect())
    }

    async fn list_user_roles(&self) -> StoreResult<Vec<UserRole>> {
        Ok(self.tables.read().await.user_roles.values())
    }

    async fn assign_role(&self, user_id: i64, role_id: i64) -> StoreResult<Linked<UserRole>> {
        let mut tables = self.tables.write().await;
        if !tables.users.rows.contains_key(&user_id) {
            return Err(StoreError::NotFound("user".into()));
        }
        if !tables.roles.rows.contains_key(&role_id) {
            return Err(StoreError::NotFound("role".into()));
        }
        if let Some(existing) = tables
            .user_roles
            .rows
            .values()
            .find(|link| link.user_id == user_id && link.role_id == role_id)
        {
            return Ok(Linked {
                link: existing.clone(),
                created: false,
            });
        }
        let link = tables.user_roles.insert_with(|id| UserRole {
            id,
            user_id,
            role_id,
        });
        Ok(Linked {
            link,
            created: true,
        })
    }

    async fn delete_user_role(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.user_roles.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("user role".into()));
        }
        Ok(())
    }

    async fn user_roles(&self, user_id: i64) -> StoreResult<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .role_ids_for_user(user_id)
            .iter()
            .filter_map(|id| tables.roles.rows.get(id).cloned())
            .collect())
    }

    async fn user_permission_keys(&self, user_id: i64) -> StoreResult<Vec<PermissionKey>> {
        let tables = self.tables.read().await;
        let role_ids = tables.role_ids_for_user(user_id);
        let keys: BTreeSet<PermissionKey> = tables
            .permission_ids_for_roles(&role_ids)
            .iter()
            .filter_map(|id| tables.permissions.rows.get(id))
            .filter_map(|permission| {
                tables
                    .resources
                    .rows
                    .get(&permission.resource_id)
                    .map(|resource| PermissionKey::new(permission.action, resource.name.clone()))
            })
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn user_has_permission(
        &self,
        user_id: i64,
        action: Action,
        resource: &str,
    ) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        let role_ids = tables.role_ids_for_user(user_id);
        let granted = tables
            .permission_ids_for_roles(&role_ids)
            .iter()
            .filter_map(|id| tables.permissions.rows.get(id))
            .any(|permission| {
                permission.action == action
                    && tables
                        .resources
                        .rows
                        .get(&permission.resource_id)
                        .is_some_and(|row| row.name == resource)
            });
        Ok(granted)
    }

    async fn user_has_role(&self, user_id: i64, role_name: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .role_ids_for_user(user_id)
            .iter()
            .filter_map(|id| tables.roles.rows.get(id))
            .any(|role| role.name == role_name))
    }
}

#[async_trait]
impl FleetStore for InMemoryStore {
    async fn list_sites(&self) -> StoreResult<Vec<Site>> {
        Ok(self.tables.read().await.sites.values())
    }

    async fn get_site(&self, id: i64) -> StoreResult<Site> {
        self.tables
            .read()
            .await
            .sites
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("site".into()))
    }

    async fn find_site_by_name(&self, name: &str) -> StoreResult<Option<Site>> {
        Ok(self
            .tables
            .read()
            .await
            .sites
            .rows
            .values()
            .find(|row| row.name == name)
            .cloned())
    }

    async fn create_site(&self, site: NewSite) -> StoreResult<Site> {
        let mut tables = self.tables.write().await;
        if Tables::name_taken(&tables.sites, &site.name, None, |row| &row.name) {
            return Err(StoreError::Conflict("site exists".into()));
        }
        Ok(tables.sites.insert_with(|id| Site {
            id,
            name: site.name,
            location: site.location,
            description: site.description,
        }))
    }

    async fn update_site(&self, id: i64, patch: SitePatch) -> StoreResult<Site> {
        let mut tables = self.tables.write().await;
        if let Some(name) = &patch.name {
            if Tables::name_taken(&tables.sites, name, Some(id), |row| &row.name) {
                return Err(StoreError::Conflict("site exists".into()));
            }
        }
        let row = tables
            .sites
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("site".into()))?;
        if let Some(name) = patch.name {
            row.name = name;
        }
        if let Some(location) = patch.location {
            row.location = location;
        }
        if let Some(description) = patch.description {
            row.description = description;
        }
        Ok(row.clone())
    }

    async fn delete_site(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.sites.rows.contains_key(&id) {
            return Err(StoreError::NotFound("site".into()));
        }
        if tables.engins.rows.values().any(|row| row.site_id == id) {
            return Err(StoreError::Conflict("site is referenced by engins".into()));
        }
        tables.sites.rows.remove(&id);
        Ok(())
    }

    async fn count_site_engins(&self, id: i64) -> StoreResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .engins
            .rows
            .values()
            .filter(|row| row.site_id == id)
            .count() as i64)
    }

    async fn list_engins(&self, site_id: Option<i64>) -> StoreResult<Vec<Engin>> {
        Ok(self
            .tables
            .read()
            .await
            .engins
            .rows
            .values()
            .filter(|row| site_id.is_none_or(|site| row.site_id == site))
            .cloned()
            .collect())
    }

    async fn get_engin(&self, id: i64) -> StoreResult<Engin> {
        self.tables
            .read()
            .await
            .engins
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("engin".into()))
    }

    async fn find_engin_by_code(&self, code: &str) -> StoreResult<Option<Engin>> {
        Ok(self
            .tables
            .read()
            .await
            .engins
            .rows
            .values()
            .find(|row| row.code == code)
            .cloned())
    }

    async fn create_engin(&self, engin: NewEngin) -> StoreResult<Engin> {
        let mut tables = self.tables.write().await;
        if !tables.sites.rows.contains_key(&engin.site_id) {
            return Err(StoreError::NotFound("site".into()));
        }
        if Tables::name_taken(&tables.engins, &engin.code, None, |row| &row.code) {
            return Err(StoreError::Conflict("engin exists".into()));
        }
        Ok(tables.engins.insert_with(|id| Engin {
            id,
            code: engin.code,
            label: engin.label,
            site_id: engin.site_id,
            status: engin.status,
        }))
    }

    async fn update_engin(&self, id: i64, patch: EnginPatch) -> StoreResult<Engin> {
        let mut tables = self.tables.write().await;
        if let Some(site_id) = patch.site_id {
            if !tables.sites.rows.contains_key(&site_id) {
                return Err(StoreError::NotFound("site".into()));
            }
        }
        if let Some(code) = &patch.code {
            if Tables::name_taken(&tables.engins, code, Some(id), |row| &row.code) {
                return Err(StoreError::Conflict("engin exists".into()));
            }
        }
        let row = tables
            .engins
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("engin".into()))?;
        if let Some(code) = patch.code {
            row.code = code;
        }
        if let Some(label) = patch.label {
            row.label = label;
        }
        if let Some(site_id) = patch.site_id {
            row.site_id = site_id;
        }
        if let Some(status) = patch.status {
            row.status = status;
        }
        Ok(row.clone())
    }

    async fn delete_engin(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.engins.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("engin".into()));
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(store: &InMemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                email: email.to_string(),
                name: "Test".to_string(),
                password_hash: "hash".to_string(),
                salt: "salt".to_string(),
            })
            .await
            .expect("user")
    }

    async fn seed_permission(
        store: &InMemoryStore,
        resource: &Resource,
        action: Action,
    ) -> Permission {
        store
            .create_permission(NewPermission {
                name: format!("{action}:{}", resource.name),
                resource_id: resource.id,
                action,
                description: None,
            })
            .await
            .expect("permission")
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially_and_not_reused() {
        let store = InMemoryStore::new();
        let a = store
            .create_resource(NewResource {
                name: "sites".into(),
                label: "Sites".into(),
            })
            .await
            .expect("a");
        store.delete_resource(a.id).await.expect("delete");
        let b = store
            .create_resource(NewResource {
                name: "sites".into(),
                label: "Sites".into(),
            })
            .await
            .expect("b");
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let store = InMemoryStore::new();
        let new = NewResource {
            name: "sites".into(),
            label: "Sites".into(),
        };
        store.create_resource(new.clone()).await.expect("first");
        let err = store.create_resource(new).await.expect_err("second");
        assert!(matches!(err, StoreError::Conflict(_)));
        seed_user(&store, "a@example.com").await;
        let err = store
            .create_user(NewUser {
                email: "a@example.com".into(),
                name: "Other".into(),
                password_hash: "h".into(),
                salt: "s".into(),
            })
            .await
            .expect_err("duplicate email");
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn permission_joins_follow_role_links() {
        let store = InMemoryStore::new();
        let user = seed_user(&store, "u@example.com").await;
        let sites = store
            .create_resource(NewResource {
                name: "sites".into(),
                label: "Sites".into(),
            })
            .await
            .expect("resource");
        let read = seed_permission(&store, &sites, Action::Read).await;
        let update = seed_permission(&store, &sites, Action::Update).await;
        let viewer = store
            .create_role(NewRole {
                name: "viewer".into(),
                description: None,
                permission_ids: vec![read.id, read.id],
            })
            .await
            .expect("viewer");
        let editor = store
            .create_role(NewRole {
                name: "editor".into(),
                description: None,
                permission_ids: vec![read.id, update.id],
            })
            .await
            .expect("editor");
        assert_eq!(store.role_permissions(viewer.id).await.expect("perms").len(), 1);

        store.assign_role(user.id, viewer.id).await.expect("assign");
        store.assign_role(user.id, editor.id).await.expect("assign");

        let keys = store.user_permission_keys(user.id).await.expect("keys");
        assert_eq!(
            keys,
            vec![
                PermissionKey::new(Action::Read, "sites"),
                PermissionKey::new(Action::Update, "sites"),
            ]
        );
        assert!(
            store
                .user_has_permission(user.id, Action::Update, "sites")
                .await
                .expect("check")
        );
        assert!(
            !store
                .user_has_permission(user.id, Action::Delete, "sites")
                .await
                .expect("check")
        );
        assert!(store.user_has_role(user.id, "editor").await.expect("role"));
        assert!(!store.user_has_role(user.id, "admin").await.expect("role"));
    }

    #[tokio::test]
    async fn assign_role_is_idempotent() {
        let store = InMemoryStore::new();
        let user = seed_user(&store, "u@example.com").await;
        let role = store
            .create_role(NewRole {
                name: "viewer".into(),
                description: None,
                permission_ids: vec![],
            })
            .await
            .expect("role");
        let first = store.assign_role(user.id, role.id).await.expect("first");
        let second = store.assign_role(user.id, role.id).await.expect("second");
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.link, second.link);
        assert_eq!(store.count_role_users(role.id).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn unknown_user_has_no_permissions() {
        let store = InMemoryStore::new();
        assert!(store.user_permission_keys(42).await.expect("keys").is_empty());
        assert!(store.user_roles(42).await.expect("roles").is_empty());
    }

    #[tokio::test]
    async fn update_role_replaces_links() {
        let store = InMemoryStore::new();
        let sites = store
            .create_resource(NewResource {
                name: "sites".into(),
                label: "Sites".into(),
            })
            .await
            .expect("resource");
        let read = seed_permission(&store, &sites, Action::Read).await;
        let delete = seed_permission(&store, &sites, Action::Delete).await;
        let role = store
            .create_role(NewRole {
                name: "ops".into(),
                description: None,
                permission_ids: vec![read.id],
            })
            .await
            .expect("role");
        store
            .update_role(
                role.id,
                RolePatch {
                    permission_ids: Some(vec![delete.id]),
                    ..RolePatch::default()
                },
            )
            .await
            .expect("update");
        let perms = store.role_permissions(role.id).await.expect("perms");
        assert_eq!(perms, vec![delete]);
        assert_eq!(store.count_permission_roles(read.id).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn engins_require_existing_site() {
        let store = InMemoryStore::new();
        let err = store
            .create_engin(NewEngin {
                code: "EX-01".into(),
                label: "Excavator".into(),
                site_id: 9,
                status: Default::default(),
            })
            .await
            .expect_err("missing site");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn referenced_rows_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let resource = store
            .create_resource(NewResource {
                name: "sites".into(),
                label: "Sites".into(),
            })
            .await
            .expect("resource");
        let permission = seed_permission(&store, &resource, Action::Read).await;
        let err = store
            .delete_resource(resource.id)
            .await
            .expect_err("resource in use");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(
            store.get_permission(permission.id).await.expect("kept"),
            permission
        );

        let site = store
            .create_site(NewSite {
                name: "Depot Nord".into(),
                location: None,
                description: None,
            })
            .await
            .expect("site");
        let engin = store
            .create_engin(NewEngin {
                code: "EX-01".into(),
                label: "Excavator".into(),
                site_id: site.id,
                status: Default::default(),
            })
            .await
            .expect("engin");
        let err = store.delete_site(site.id).await.expect_err("site in use");
        assert!(matches!(err, StoreError::Conflict(_)));

        store.delete_engin(engin.id).await.expect("delete engin");
        store.delete_site(site.id).await.expect("delete site");
        store.delete_permission(permission.id).await.expect("delete permission");
        store.delete_resource(resource.id).await.expect("delete resource");
    }

    #[tokio::test]
    async fn patches_clear_nullable_text() {
        let store = InMemoryStore::new();
        let site = store
            .create_site(NewSite {
                name: "Depot Nord".into(),
                location: Some("Lille".into()),
                description: Some("old".into()),
            })
            .await
            .expect("site");
        let updated = store
            .update_site(
                site.id,
                SitePatch {
                    description: Some(None),
                    ..SitePatch::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.description, None);
        assert_eq!(updated.location.as_deref(), Some("Lille"));
    }
}
