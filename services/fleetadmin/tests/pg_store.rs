#![cfg(feature = "pg-tests")]

use fleet_authz::{Action, PermissionKey};
use fleetadmin::config::PostgresConfig;
use fleetadmin::model::{
    EnginStatus, NewEngin, NewPermission, NewResource, NewRole, NewSite, NewUser, RolePatch,
    SitePatch,
};
use fleetadmin::store::postgres::PostgresStore;
use fleetadmin::store::{FleetStore, RbacStore, StoreError};
use serial_test::serial;

async fn pg_store() -> Option<PostgresStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping pg-tests: set DATABASE_URL");
        return None;
    };
    let store = match PostgresStore::connect(&PostgresConfig {
        url: url.clone(),
        max_connections: 5,
        acquire_timeout_ms: 5_000,
    })
    .await
    {
        Ok(store) => store,
        Err(err) => {
            eprintln!("skipping pg-tests: cannot connect to postgres: {err}");
            return None;
        }
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .expect("reset pool");
    sqlx::query(
        "TRUNCATE user_roles, role_permissions, engins, sites, permissions, resources, roles, users RESTART IDENTITY",
    )
    .execute(&pool)
    .await
    .expect("truncate");
    Some(store)
}

async fn user(store: &PostgresStore, email: &str) -> i64 {
    store
        .create_user(NewUser {
            email: email.to_string(),
            name: "Tech".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            salt: "salt".to_string(),
        })
        .await
        .expect("user")
        .id
}

#[tokio::test]
#[serial]
async fn permission_graph_resolves_through_joins() {
    let Some(store) = pg_store().await else {
        return;
    };
    let resource = store
        .create_resource(NewResource {
            name: "sites".to_string(),
            label: "Sites".to_string(),
        })
        .await
        .expect("resource");
    let permission = store
        .create_permission(NewPermission {
            name: "read:sites".to_string(),
            resource_id: resource.id,
            action: Action::Read,
            description: None,
        })
        .await
        .expect("permission");
    let role = store
        .create_role(NewRole {
            name: "viewer".to_string(),
            description: None,
            permission_ids: vec![permission.id, permission.id],
        })
        .await
        .expect("role");
    let user_id = user(&store, "tech@fleet.test").await;
    let first = store.assign_role(user_id, role.id).await.expect("assign");
    let second = store.assign_role(user_id, role.id).await.expect("reassign");
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.link.id, second.link.id);

    assert!(
        store
            .user_has_permission(user_id, Action::Read, "sites")
            .await
            .expect("read")
    );
    assert!(
        !store
            .user_has_permission(user_id, Action::Delete, "sites")
            .await
            .expect("delete")
    );
    assert_eq!(
        store.user_permission_keys(user_id).await.expect("keys"),
        vec![PermissionKey::new(Action::Read, "sites")]
    );
    assert_eq!(store.count_role_users(role.id).await.expect("count"), 1);
    assert_eq!(
        store.count_permission_roles(permission.id).await.expect("count"),
        1
    );

    store
        .update_role(
            role.id,
            RolePatch {
                permission_ids: Some(Vec::new()),
                ..RolePatch::default()
            },
        )
        .await
        .expect("clear links");
    assert!(
        store
            .user_permission_keys(user_id)
            .await
            .expect("keys")
            .is_empty()
    );
}

#[tokio::test]
#[serial]
async fn unique_and_foreign_key_violations_map_to_conflict() {
    let Some(store) = pg_store().await else {
        return;
    };
    user(&store, "dup@fleet.test").await;
    let err = store
        .create_user(NewUser {
            email: "dup@fleet.test".to_string(),
            name: "Dup".to_string(),
            password_hash: "x".to_string(),
            salt: "y".to_string(),
        })
        .await
        .expect_err("duplicate email");
    assert!(matches!(err, StoreError::Conflict(_)));

    let site = store
        .create_site(NewSite {
            name: "Depot Nord".to_string(),
            location: Some("Lille".to_string()),
            description: Some("old".to_string()),
        })
        .await
        .expect("site");
    let cleared = store
        .update_site(
            site.id,
            SitePatch {
                description: Some(None),
                ..SitePatch::default()
            },
        )
        .await
        .expect("clear description");
    assert_eq!(cleared.description, None);
    assert_eq!(cleared.location.as_deref(), Some("Lille"));
    store
        .create_engin(NewEngin {
            code: "EX-01".to_string(),
            label: "Excavator".to_string(),
            site_id: site.id,
            status: EnginStatus::Maintenance,
        })
        .await
        .expect("engin");
    let err = store.delete_site(site.id).await.expect_err("site in use");
    assert!(matches!(err, StoreError::Conflict(_)));

    let engins = store.list_engins(Some(site.id)).await.expect("list");
    assert_eq!(engins.len(), 1);
    assert_eq!(engins[0].status, EnginStatus::Maintenance);
    assert!(store.list_engins(Some(site.id + 1)).await.expect("list").is_empty());
}

#[tokio::test]
#[serial]
async fn missing_rows_are_not_found() {
    let Some(store) = pg_store().await else {
        return;
    };
    assert!(matches!(
        store.get_role(42).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_user_role(42).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(store.user_roles(42).await.expect("roles").is_empty());
    store.health_check().await.expect("health");
    assert!(store.is_durable());
}
