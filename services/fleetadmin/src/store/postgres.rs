//! Postgres-backed implementation of the fleet-admin store.
//!
//! # What this module is
//! Implements [`RbacStore`] and [`FleetStore`] using Postgres (via `sqlx`) as the durable,
//! shared backing store for users, the role/permission graph, sites and engins.
//!
//! # Key invariants
//! - Natural keys (`users.email`, `roles.name`, `permissions.name`, `resources.name`,
//!   `sites.name`, `engins.code`) carry `UNIQUE` constraints; violations surface as
//!   [`StoreError::Conflict`] even when the handler's pre-check lost a race.
//! - Join tables carry `UNIQUE` pairs, so links are inserted with `ON CONFLICT DO NOTHING`
//!   and re-read when they already exist.
//! - `permissions.resource_id` and `engins.site_id` are `RESTRICT` foreign keys; deleting a
//!   referenced row surfaces as [`StoreError::Conflict`].
//! - Patches leave absent columns untouched; nullable text columns (`description`,
//!   `location`) are written, possibly to `NULL`, when the patch carries `Some(..)`.
//!
//! # Concurrency model
//! - The store is shared across async handlers; `sqlx::PgPool` manages concurrency.
//! - Role creation and link replacement run in one transaction so a role never appears
//!   with half of its requested permissions.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!("./migrations")`.
//! - Database URLs may contain credentials; never log them.
use super::{FleetStore, Linked, RbacStore, StoreError, StoreResult};
use crate::config::PostgresConfig;
use crate::model::{
    Engin, EnginPatch, EnginStatus, NewEngin, NewPermission, NewResource, NewRole, NewSite,
    NewUser, Permission, PermissionPatch, Resource, ResourcePatch, Role, RolePatch,
    RolePermission, Site, SitePatch, User, UserCredentials, UserRole,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_authz::{Action, PermissionKey};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Durable fleet-admin store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use fleetadmin::config::PostgresConfig;
/// use fleetadmin::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: i64,
    email: String,
    name: String,
    password_hash: String,
    salt: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbResource {
    id: i64,
    name: String,
    label: String,
}

#[derive(Debug, Clone, FromRow)]
struct DbPermission {
    id: i64,
    name: String,
    resource_id: i64,
    action: String,
    description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct DbRole {
    id: i64,
    name: String,
    description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct DbLink {
    id: i64,
    left_id: i64,
    right_id: i64,
}

#[derive(Debug, Clone, FromRow)]
struct DbSite {
    id: i64,
    name: String,
    location: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct DbEngin {
    id: i64,
    code: String,
    label: String,
    site_id: i64,
    status: String,
}

#[derive(Debug, Clone, FromRow)]
struct DbKey {
    action: String,
    resource: String,
}

impl PostgresStore {
    /// Connect to Postgres and apply embedded migrations.
    ///
    /// # Errors
    /// - Connection, migration, or pool setup failures.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        // Fail fast on pool exhaustion instead of hanging requests.
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;
        Ok(Self { pool })
    }

    async fn exists(&self, sql: &str, id: i64) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count(&self, sql: &str, id: i64) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn require(&self, sql: &str, id: i64, what: &str) -> StoreResult<()> {
        if self.exists(sql, id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(what.to_string()))
        }
    }

    async fn delete_by_id(&self, sql: &str, id: i64, what: &str) -> StoreResult<()> {
        let result = sqlx::query(sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(what.to_string()));
        }
        Ok(())
    }
}

/// Replace a role's permission links inside an open transaction.
async fn replace_role_links(
    tx: &mut Transaction<'_, Postgres>,
    role_id: i64,
    permission_ids: &[i64],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;
    let unique: BTreeSet<i64> = permission_ids.iter().copied().collect();
    for permission_id in unique {
        let insert = sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) \
             ON CONFLICT (role_id, permission_id) DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&mut **tx)
        .await;
        if let Err(err) = insert {
            if violation_code(&err) == Some(FOREIGN_KEY_VIOLATION) {
                return Err(StoreError::NotFound(format!("permission {permission_id}")));
            }
            return Err(err.into());
        }
    }
    Ok(())
}

#[async_trait]
impl RbacStore for PostgresStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let row: DbUser = sqlx::query_as(
            "INSERT INTO users (email, name, password_hash, salt) VALUES ($1, $2, $3, $4) \
             RETURNING id, email, name, password_hash, salt, created_at",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_db(row).user)
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        let row: Option<DbUser> = sqlx::query_as(
            "SELECT id, email, name, password_hash, salt, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| user_from_db(row).user)
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn find_user_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let row: Option<DbUser> = sqlx::query_as(
            "SELECT id, email, name, password_hash, salt, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_db))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows: Vec<DbUser> = sqlx::query_as(
            "SELECT id, email, name, password_hash, salt, created_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| user_from_db(row).user).collect())
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_resources(&self) -> StoreResult<Vec<Resource>> {
        let rows: Vec<DbResource> =
            sqlx::query_as("SELECT id, name, label FROM resources ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(resource_from_db).collect())
    }

    async fn get_resource(&self, id: i64) -> StoreResult<Resource> {
        let row: Option<DbResource> =
            sqlx::query_as("SELECT id, name, label FROM resources WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(resource_from_db)
            .ok_or_else(|| StoreError::NotFound("resource".into()))
    }

    async fn find_resource_by_name(&self, name: &str) -> StoreResult<Option<Resource>> {
        let row: Option<DbResource> =
            sqlx::query_as("SELECT id, name, label FROM resources WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(resource_from_db))
    }

    async fn create_resource(&self, resource: NewResource) -> StoreResult<Resource> {
        let row: DbResource = sqlx::query_as(
            "INSERT INTO resources (name, label) VALUES ($1, $2) RETURNING id, name, label",
        )
        .bind(&resource.name)
        .bind(&resource.label)
        .fetch_one(&self.pool)
        .await?;
        Ok(resource_from_db(row))
    }

    async fn update_resource(&self, id: i64, patch: ResourcePatch) -> StoreResult<Resource> {
        let row: Option<DbResource> = sqlx::query_as(
            "UPDATE resources SET name = COALESCE($2, name), label = COALESCE($3, label) \
             WHERE id = $1 RETURNING id, name, label",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.label)
        .fetch_optional(&self.pool)
        .await?;
        row.map(resource_from_db)
            .ok_or_else(|| StoreError::NotFound("resource".into()))
    }

    async fn delete_resource(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("DELETE FROM resources WHERE id = $1", id, "resource")
            .await
    }

    async fn count_resource_permissions(&self, id: i64) -> StoreResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM permissions WHERE resource_id = $1",
            id,
        )
        .await
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        let rows: Vec<DbPermission> = sqlx::query_as(
            "SELECT id, name, resource_id, action, description FROM permissions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(permission_from_db).collect()
    }

    async fn get_permission(&self, id: i64) -> StoreResult<Permission> {
        let row: Option<DbPermission> = sqlx::query_as(
            "SELECT id, name, resource_id, action, description FROM permissions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(permission_from_db)
            .ok_or_else(|| StoreError::NotFound("permission".into()))?
    }

    async fn find_permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        let row: Option<DbPermission> = sqlx::query_as(
            "SELECT id, name, resource_id, action, description FROM permissions WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(permission_from_db).transpose()
    }

    async fn create_permission(&self, permission: NewPermission) -> StoreResult<Permission> {
        self.require(
            "SELECT EXISTS(SELECT 1 FROM resources WHERE id = $1)",
            permission.resource_id,
            "resource",
        )
        .await?;
        let row: DbPermission = sqlx::query_as(
            "INSERT INTO permissions (name, resource_id, action, description) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, name, resource_id, action, description",
        )
        .bind(&permission.name)
        .bind(permission.resource_id)
        .bind(permission.action.as_str())
        .bind(&permission.description)
        .fetch_one(&self.pool)
        .await?;
        permission_from_db(row)
    }

    async fn update_permission(
        &self,
        id: i64,
        patch: PermissionPatch,
    ) -> StoreResult<Permission> {
        if let Some(resource_id) = patch.resource_id {
            self.require(
                "SELECT EXISTS(SELECT 1 FROM resources WHERE id = $1)",
                resource_id,
                "resource",
            )
            .await?;
        }
        let set_description = patch.description.is_some();
        let row: Option<DbPermission> = sqlx::query_as(
            "UPDATE permissions SET name = COALESCE($2, name), \
             resource_id = COALESCE($3, resource_id), action = COALESCE($4, action), \
             description = CASE WHEN $6 THEN $5 ELSE description END \
             WHERE id = $1 RETURNING id, name, resource_id, action, description",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.resource_id)
        .bind(patch.action.map(Action::as_str))
        .bind(patch.description.flatten())
        .bind(set_description)
        .fetch_optional(&self.pool)
        .await?;
        row.map(permission_from_db)
            .ok_or_else(|| StoreError::NotFound("permission".into()))?
    }

    async fn delete_permission(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("DELETE FROM permissions WHERE id = $1", id, "permission")
            .await
    }

    async fn count_permission_roles(&self, id: i64) -> StoreResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM role_permissions WHERE permission_id = $1",
            id,
        )
        .await
    }

    async fn attach_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> StoreResult<Linked<RolePermission>> {
        self.require(
            "SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1)",
            role_id,
            "role",
        )
        .await?;
        self.require(
            "SELECT EXISTS(SELECT 1 FROM permissions WHERE id = $1)",
            permission_id,
            "permission",
        )
        .await?;
        let inserted: Option<DbLink> = sqlx::query_as(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) \
             ON CONFLICT (role_id, permission_id) DO NOTHING \
             RETURNING id, role_id AS left_id, permission_id AS right_id",
        )
        .bind(role_id)
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await?;
        let (row, created) = match inserted {
            Some(row) => (row, true),
            None => {
                let row: DbLink = sqlx::query_as(
                    "SELECT id, role_id AS left_id, permission_id AS right_id \
                     FROM role_permissions WHERE role_id = $1 AND permission_id = $2",
                )
                .bind(role_id)
                .bind(permission_id)
                .fetch_one(&self.pool)
                .await?;
                (row, false)
            }
        };
        Ok(Linked {
            link: RolePermission {
                id: row.id,
                role_id: row.left_id,
                permission_id: row.right_id,
            },
            created,
        })
    }

    async fn detach_permission(&self, role_id: i64, permission_id: i64) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id)
                .bind(permission_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("role permission".into()));
        }
        Ok(())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let rows: Vec<DbRole> =
            sqlx::query_as("SELECT id, name, description FROM roles ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(role_from_db).collect())
    }

    async fn get_role(&self, id: i64) -> StoreResult<Role> {
        let row: Option<DbRole> =
            sqlx::query_as("SELECT id, name, description FROM roles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(role_from_db)
            .ok_or_else(|| StoreError::NotFound("role".into()))
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let row: Option<DbRole> =
            sqlx::query_as("SELECT id, name, description FROM roles WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(role_from_db))
    }

    async fn create_role(&self, role: NewRole) -> StoreResult<Role> {
        let mut tx = self.pool.begin().await?;
        let row: DbRole = sqlx::query_as(
            "INSERT INTO roles (name, description) VALUES ($1, $2) \
             RETURNING id, name, description",
        )
        .bind(&role.name)
        .bind(&role.description)
        .fetch_one(&mut *tx)
        .await?;
        replace_role_links(&mut tx, row.id, &role.permission_ids).await?;
        tx.commit().await?;
        Ok(role_from_db(row))
    }

    async fn update_role(&self, id: i64, patch: RolePatch) -> StoreResult<Role> {
        let mut tx = self.pool.begin().await?;
        let set_description = patch.description.is_some();
        let row: Option<DbRole> = sqlx::query_as(
            "UPDATE roles SET name = COALESCE($2, name), \
             description = CASE WHEN $4 THEN $3 ELSE description END \
             WHERE id = $1 RETURNING id, name, description",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.description.flatten())
        .bind(set_description)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(StoreError::NotFound("role".into()));
        };
        if let Some(permission_ids) = &patch.permission_ids {
            replace_role_links(&mut tx, id, permission_ids).await?;
        }
        tx.commit().await?;
        Ok(role_from_db(row))
    }

    async fn delete_role(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("DELETE FROM roles WHERE id = $1", id, "role")
            .await
    }

    async fn count_role_users(&self, id: i64) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM user_roles WHERE role_id = $1", id)
            .await
    }

    async fn role_permissions(&self, role_id: i64) -> StoreResult<Vec<Permission>> {
        let rows: Vec<DbPermission> = sqlx::query_as(
            "SELECT p.id, p.name, p.resource_id, p.action, p.description \
             FROM permissions p JOIN role_permissions rp ON rp.permission_id = p.id \
             WHERE rp.role_id = $1 ORDER BY p.id",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(permission_from_db).collect()
    }

    async fn list_user_roles(&self) -> StoreResult<Vec<UserRole>> {
        let rows: Vec<DbLink> = sqlx::query_as(
            "SELECT id, user_id AS left_id, role_id AS right_id FROM user_roles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(user_role_from_db).collect())
    }

    async fn assign_role(&self, user_id: i64, role_id: i64) -> StoreResult<Linked<UserRole>> {
        self.require(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)",
            user_id,
            "user",
        )
        .await?;
        self.require(
            "SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1)",
            role_id,
            "role",
        )
        .await?;
        let inserted: Option<DbLink> = sqlx::query_as(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, role_id) DO NOTHING \
             RETURNING id, user_id AS left_id, role_id AS right_id",
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?;
        let (row, created) = match inserted {
            Some(row) => (row, true),
            None => {
                let row: DbLink = sqlx::query_as(
                    "SELECT id, user_id AS left_id, role_id AS right_id \
                     FROM user_roles WHERE user_id = $1 AND role_id = $2",
                )
                .bind(user_id)
                .bind(role_id)
                .fetch_one(&self.pool)
                .await?;
                (row, false)
            }
        };
        Ok(Linked {
            link: user_role_from_db(row),
            created,
        })
    }

    async fn delete_user_role(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("DELETE FROM user_roles WHERE id = $1", id, "user role")
            .await
    }

    async fn user_roles(&self, user_id: i64) -> StoreResult<Vec<Role>> {
        let rows: Vec<DbRole> = sqlx::query_as(
            "SELECT r.id, r.name, r.description FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1 ORDER BY r.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(role_from_db).collect())
    }

    async fn user_permission_keys(&self, user_id: i64) -> StoreResult<Vec<PermissionKey>> {
        let rows: Vec<DbKey> = sqlx::query_as(
            "SELECT DISTINCT p.action, res.name AS resource \
             FROM user_roles ur \
             JOIN role_permissions rp ON rp.role_id = ur.role_id \
             JOIN permissions p ON p.id = rp.permission_id \
             JOIN resources res ON res.id = p.resource_id \
             WHERE ur.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let keys = rows
            .into_iter()
            .map(|row| Ok(PermissionKey::new(parse_action(&row.action)?, row.resource)))
            .collect::<StoreResult<BTreeSet<_>>>()?;
        Ok(keys.into_iter().collect())
    }

    async fn user_has_permission(
        &self,
        user_id: i64,
        action: Action,
        resource: &str,
    ) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_roles ur \
             JOIN role_permissions rp ON rp.role_id = ur.role_id \
             JOIN permissions p ON p.id = rp.permission_id \
             JOIN resources res ON res.id = p.resource_id \
             WHERE ur.user_id = $1 AND p.action = $2 AND res.name = $3)",
        )
        .bind(user_id)
        .bind(action.as_str())
        .bind(resource)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn user_has_role(&self, user_id: i64, role_name: &str) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 AND r.name = $2)",
        )
        .bind(user_id)
        .bind(role_name)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl FleetStore for PostgresStore {
    async fn list_sites(&self) -> StoreResult<Vec<Site>> {
        let rows: Vec<DbSite> =
            sqlx::query_as("SELECT id, name, location, description FROM sites ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(site_from_db).collect())
    }

    async fn get_site(&self, id: i64) -> StoreResult<Site> {
        let row: Option<DbSite> =
            sqlx::query_as("SELECT id, name, location, description FROM sites WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(site_from_db)
            .ok_or_else(|| StoreError::NotFound("site".into()))
    }

    async fn find_site_by_name(&self, name: &str) -> StoreResult<Option<Site>> {
        let row: Option<DbSite> =
            sqlx::query_as("SELECT id, name, location, description FROM sites WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(site_from_db))
    }

    async fn create_site(&self, site: NewSite) -> StoreResult<Site> {
        let row: DbSite = sqlx::query_as(
            "INSERT INTO sites (name, location, description) VALUES ($1, $2, $3) \
             RETURNING id, name, location, description",
        )
        .bind(&site.name)
        .bind(&site.location)
        .bind(&site.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(site_from_db(row))
    }

    async fn update_site(&self, id: i64, patch: SitePatch) -> StoreResult<Site> {
        let set_location = patch.location.is_some();
        let set_description = patch.description.is_some();
        let row: Option<DbSite> = sqlx::query_as(
            "UPDATE sites SET name = COALESCE($2, name), \
             location = CASE WHEN $5 THEN $3 ELSE location END, \
             description = CASE WHEN $6 THEN $4 ELSE description END \
             WHERE id = $1 RETURNING id, name, location, description",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.location.flatten())
        .bind(patch.description.flatten())
        .bind(set_location)
        .bind(set_description)
        .fetch_optional(&self.pool)
        .await?;
        row.map(site_from_db)
            .ok_or_else(|| StoreError::NotFound("site".into()))
    }

    async fn delete_site(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("DELETE FROM sites WHERE id = $1", id, "site")
            .await
    }

    async fn count_site_engins(&self, id: i64) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM engins WHERE site_id = $1", id)
            .await
    }

    async fn list_engins(&self, site_id: Option<i64>) -> StoreResult<Vec<Engin>> {
        let rows: Vec<DbEngin> = sqlx::query_as(
            "SELECT id, code, label, site_id, status FROM engins \
             WHERE ($1::BIGINT IS NULL OR site_id = $1) ORDER BY id",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(engin_from_db).collect()
    }

    async fn get_engin(&self, id: i64) -> StoreResult<Engin> {
        let row: Option<DbEngin> =
            sqlx::query_as("SELECT id, code, label, site_id, status FROM engins WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(engin_from_db)
            .ok_or_else(|| StoreError::NotFound("engin".into()))?
    }

    async fn find_engin_by_code(&self, code: &str) -> StoreResult<Option<Engin>> {
        let row: Option<DbEngin> =
            sqlx::query_as("SELECT id, code, label, site_id, status FROM engins WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
        row.map(engin_from_db).transpose()
    }

    async fn create_engin(&self, engin: NewEngin) -> StoreResult<Engin> {
        self.require(
            "SELECT EXISTS(SELECT 1 FROM sites WHERE id = $1)",
            engin.site_id,
            "site",
        )
        .await?;
        let row: DbEngin = sqlx::query_as(
            "INSERT INTO engins (code, label, site_id, status) VALUES ($1, $2, $3, $4) \
             RETURNING id, code, label, site_id, status",
        )
        .bind(&engin.code)
        .bind(&engin.label)
        .bind(engin.site_id)
        .bind(engin.status.as_str())
        .fetch_one(&self.pool)
        .await?;
        engin_from_db(row)
    }

    async fn update_engin(&self, id: i64, patch: EnginPatch) -> StoreResult<Engin> {
        if let Some(site_id) = patch.site_id {
            self.require(
                "SELECT EXISTS(SELECT 1 FROM sites WHERE id = $1)",
                site_id,
                "site",
            )
            .await?;
        }
        let row: Option<DbEngin> = sqlx::query_as(
            "UPDATE engins SET code = COALESCE($2, code), label = COALESCE($3, label), \
             site_id = COALESCE($4, site_id), status = COALESCE($5, status) \
             WHERE id = $1 RETURNING id, code, label, site_id, status",
        )
        .bind(id)
        .bind(patch.code)
        .bind(patch.label)
        .bind(patch.site_id)
        .bind(patch.status.map(EnginStatus::as_str))
        .fetch_optional(&self.pool)
        .await?;
        row.map(engin_from_db)
            .ok_or_else(|| StoreError::NotFound("engin".into()))?
    }

    async fn delete_engin(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("DELETE FROM engins WHERE id = $1", id, "engin")
            .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match violation_code(&err) {
            Some(UNIQUE_VIOLATION) => StoreError::Conflict("record already exists".into()),
            Some(FOREIGN_KEY_VIOLATION) => {
                StoreError::Conflict("record is referenced by other records".into())
            }
            _ => StoreError::Unexpected(err.into()),
        }
    }
}

fn violation_code(err: &sqlx::Error) -> Option<&'static str> {
    if let sqlx::Error::Database(db_err) = err {
        return match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => Some(UNIQUE_VIOLATION),
            Some(FOREIGN_KEY_VIOLATION) => Some(FOREIGN_KEY_VIOLATION),
            _ => None,
        };
    }
    None
}

fn parse_action(value: &str) -> StoreResult<Action> {
    value
        .parse()
        .map_err(|err| StoreError::Unexpected(anyhow!("invalid stored action: {err}")))
}

fn user_from_db(row: DbUser) -> UserCredentials {
    UserCredentials {
        user: User {
            id: row.id,
            email: row.email,
            name: row.name,
            created_at: row.created_at,
        },
        password_hash: row.password_hash,
        salt: row.salt,
    }
}

fn resource_from_db(row: DbResource) -> Resource {
    Resource {
        id: row.id,
        name: row.name,
        label: row.label,
    }
}

fn permission_from_db(row: DbPermission) -> StoreResult<Permission> {
    Ok(Permission {
        id: row.id,
        name: row.name,
        resource_id: row.resource_id,
        action: parse_action(&row.action)?,
        description: row.description,
    })
}

fn role_from_db(row: DbRole) -> Role {
    Role {
        id: row.id,
        name: row.name,
        description: row.description,
    }
}

fn user_role_from_db(row: DbLink) -> UserRole {
    UserRole {
        id: row.id,
        user_id: row.left_id,
        role_id: row.right_id,
    }
}

fn site_from_db(row: DbSite) -> Site {
    Site {
        id: row.id,
        name: row.name,
        location: row.location,
        description: row.description,
    }
}

fn engin_from_db(row: DbEngin) -> StoreResult<Engin> {
    let status = EnginStatus::parse(&row.status)
        .ok_or_else(|| StoreError::Unexpected(anyhow!("invalid engin status: {}", row.status)))?;
    Ok(Engin {
        id: row.id,
        code: row.code,
        label: row.label,
        site_id: row.site_id,
        status,
    })
}
