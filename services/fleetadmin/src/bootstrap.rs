//! Startup seeding.
//!
//! # Purpose
//! Makes a fresh store usable: every resource name the route guards check is
//! present in the catalog with its CRUD permissions, the `super-admin` role
//! exists, and (when configured) a seed user holds it. Without a seed user
//! nobody could pass a guard on an empty store.
//!
//! # Key invariants
//! - Every step is idempotent; restarts never duplicate records.
//! - An existing seed user keeps their password; only the role link is ensured.
use crate::app::GUARDED_RESOURCES;
use crate::auth::password::hash_password;
use crate::config::SeedAdmin;
use crate::model::{NewPermission, NewResource, NewRole, NewUser};
use crate::store::AdminStore;
use anyhow::{Context, Result};
use fleet_authz::{Action, PermissionKey, SUPER_ADMIN_ROLE};

/// Counts of records created by one [`seed`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub resources: usize,
    pub permissions: usize,
    pub roles: usize,
    pub users: usize,
}

pub async fn seed(store: &dyn AdminStore, admin: Option<&SeedAdmin>) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    seed_catalog(store, &mut report).await?;
    let role_id = ensure_super_admin_role(store, &mut report).await?;
    if let Some(admin) = admin {
        seed_admin_user(store, admin, role_id, &mut report).await?;
    }
    tracing::info!(
        resources = report.resources,
        permissions = report.permissions,
        roles = report.roles,
        users = report.users,
        "seed complete"
    );
    Ok(report)
}

async fn seed_catalog(store: &dyn AdminStore, report: &mut SeedReport) -> Result<()> {
    for name in GUARDED_RESOURCES {
        let resource = match store.find_resource_by_name(name).await? {
            Some(resource) => resource,
            None => {
                report.resources += 1;
                store
                    .create_resource(NewResource {
                        name: name.to_string(),
                        label: label_for(name),
                    })
                    .await
                    .with_context(|| format!("seed resource {name}"))?
            }
        };
        for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
            let key = PermissionKey::new(action, name).as_string();
            if store.find_permission_by_name(&key).await?.is_some() {
                continue;
            }
            store
                .create_permission(NewPermission {
                    name: key.clone(),
                    resource_id: resource.id,
                    action,
                    description: None,
                })
                .await
                .with_context(|| format!("seed permission {key}"))?;
            report.permissions += 1;
        }
    }
    Ok(())
}

async fn ensure_super_admin_role(store: &dyn AdminStore, report: &mut SeedReport) -> Result<i64> {
    if let Some(role) = store.find_role_by_name(SUPER_ADMIN_ROLE).await? {
        return Ok(role.id);
    }
    let role = store
        .create_role(NewRole {
            name: SUPER_ADMIN_ROLE.to_string(),
            description: Some("Bypasses every permission check".to_string()),
            permission_ids: Vec::new(),
        })
        .await
        .context("seed super-admin role")?;
    report.roles += 1;
    Ok(role.id)
}

async fn seed_admin_user(
    store: &dyn AdminStore,
    admin: &SeedAdmin,
    role_id: i64,
    report: &mut SeedReport,
) -> Result<()> {
    let user_id = match store.find_user_credentials(&admin.email).await? {
        Some(credentials) => credentials.user.id,
        None => {
            let hashed = hash_password(&admin.password).context("hash seed admin password")?;
            let user = store
                .create_user(NewUser {
                    email: admin.email.clone(),
                    name: "Administrator".to_string(),
                    password_hash: hashed.hash,
                    salt: hashed.salt,
                })
                .await
                .context("seed admin user")?;
            report.users += 1;
            user.id
        }
    };
    store
        .assign_role(user_id, role_id)
        .await
        .context("assign super-admin role")?;
    Ok(())
}

/// `user_roles` -> `User roles`.
fn label_for(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
