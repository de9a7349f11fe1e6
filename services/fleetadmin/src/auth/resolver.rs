//! Permission resolution for a single user.
//!
//! # Purpose
//! Answers "what may this user do" against the live role graph. Every call
//! re-queries the store; nothing is cached between requests.
//!
//! # Key invariants
//! - The effective set is the union of the permissions of every assigned role.
//! - A user holding a bypass role (`admin`, `super-admin`) is allowed every
//!   `(action, resource)` pair regardless of the graph.
//! - Unknown users and users without roles resolve to an empty set; only
//!   storage failures are errors.
use crate::store::{AdminStore, StoreResult};
use fleet_authz::{Action, EffectivePermissions, is_bypass_role};
use std::sync::Arc;

#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn AdminStore + Send + Sync>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn AdminStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// Flattened, deduplicated permission set with the bypass flag set from roles.
    pub async fn get_user_permissions(&self, user_id: i64) -> StoreResult<EffectivePermissions> {
        let keys = self.store.user_permission_keys(user_id).await?;
        let roles = self.store.user_roles(user_id).await?;
        let mut set = EffectivePermissions::from_keys(keys);
        set.set_bypass(roles.iter().any(|role| is_bypass_role(&role.name)));
        Ok(set)
    }

    pub async fn has_permission(
        &self,
        user_id: i64,
        action: Action,
        resource: &str,
    ) -> StoreResult<bool> {
        if self.is_bypass(user_id).await? {
            return Ok(true);
        }
        self.store
            .user_has_permission(user_id, action, resource)
            .await
    }

    /// Exact, case-sensitive role-name membership.
    pub async fn has_role(&self, user_id: i64, role_name: &str) -> StoreResult<bool> {
        self.store.user_has_role(user_id, role_name).await
    }

    pub async fn is_bypass(&self, user_id: i64) -> StoreResult<bool> {
        for role in fleet_authz::BYPASS_ROLES {
            if self.has_role(user_id, role).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
