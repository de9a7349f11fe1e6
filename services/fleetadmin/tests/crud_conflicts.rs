mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestApp, read_json};
use http_helpers::json_request;
use serde_json::json;

async fn create(app: &TestApp, token: &str, uri: &str, body: serde_json::Value) -> i64 {
    let (status, created) = app.call("POST", uri, token, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create at {uri}: {created}");
    created["id"].as_i64().expect("id")
}

#[tokio::test]
async fn duplicate_resource_is_rejected_and_original_kept() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    create(
        &app,
        &admin,
        "/api/resources",
        json!({ "name": "sites", "label": "Sites" }),
    )
    .await;

    let (status, body) = app
        .call(
            "POST",
            "/api/resources",
            &admin,
            Some(json!({ "name": "sites", "label": "Other" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_exists");
    assert!(body["message"].as_str().expect("message").contains("sites"));

    let (_, list) = app.call("GET", "/api/resources", &admin, None).await;
    let items = list["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["label"], "Sites");
}

#[tokio::test]
async fn resource_delete_is_blocked_by_permissions() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let resource_id = create(
        &app,
        &admin,
        "/api/resources",
        json!({ "name": "sites", "label": "Sites" }),
    )
    .await;
    let permission_id = create(
        &app,
        &admin,
        "/api/permissions",
        json!({ "name": "read:sites", "resourceId": resource_id, "action": "read" }),
    )
    .await;

    let (status, body) = app
        .call("DELETE", &format!("/api/resources/{resource_id}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "has_dependents");
    assert_eq!(body["message"], "resource is referenced by 1 permissions");

    let (status, _) = app
        .call(
            "DELETE",
            &format!("/api/permissions/{permission_id}"),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call("DELETE", &format!("/api/resources/{resource_id}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app
        .call("GET", &format!("/api/resources/{resource_id}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn role_and_permission_deletes_are_blocked_by_links() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let resource_id = create(
        &app,
        &admin,
        "/api/resources",
        json!({ "name": "engins", "label": "Engins" }),
    )
    .await;
    let permission_id = create(
        &app,
        &admin,
        "/api/permissions",
        json!({ "name": "read:engins", "resourceId": resource_id, "action": "read" }),
    )
    .await;
    let role_id = create(
        &app,
        &admin,
        "/api/roles",
        json!({ "name": "viewer", "permissions": [permission_id] }),
    )
    .await;
    let user_id = app.register("tech@fleet.test", "wrench-1234").await;
    let link_id = create(
        &app,
        &admin,
        "/api/user-roles",
        json!({ "userId": user_id, "roleId": role_id }),
    )
    .await;

    let (status, body) = app
        .call(
            "DELETE",
            &format!("/api/permissions/{permission_id}"),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "has_dependents");

    let (status, body) = app
        .call("DELETE", &format!("/api/roles/{role_id}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "role is referenced by 1 user assignments");

    let (status, _) = app
        .call("DELETE", &format!("/api/user-roles/{link_id}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call("DELETE", &format!("/api/user-roles/{link_id}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting the role drops its permission links, which frees the permission.
    let (status, _) = app
        .call("DELETE", &format!("/api/roles/{role_id}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call(
            "DELETE",
            &format!("/api/permissions/{permission_id}"),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn references_must_exist() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .call(
            "POST",
            "/api/permissions",
            &admin,
            Some(json!({ "name": "read:ghosts", "resourceId": 404, "action": "read" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "resource not found");

    let (status, body) = app
        .call(
            "POST",
            "/api/roles",
            &admin,
            Some(json!({ "name": "viewer", "permissions": [77] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "permission 77 not found");
    let (_, roles) = app.call("GET", "/api/roles", &admin, None).await;
    assert!(
        roles["items"]
            .as_array()
            .expect("items")
            .iter()
            .all(|role| role["name"] != "viewer")
    );

    let (status, _) = app
        .call(
            "POST",
            "/api/user-roles",
            &admin,
            Some(json!({ "userId": 999, "roleId": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(
            "POST",
            "/api/engins",
            &admin,
            Some(json!({ "code": "EX-01", "label": "Excavator", "siteId": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "site not found");
}

#[tokio::test]
async fn role_rename_checks_other_roles_only() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let viewer = create(&app, &admin, "/api/roles", json!({ "name": "viewer" })).await;
    create(&app, &admin, "/api/roles", json!({ "name": "mechanic" })).await;

    let (status, body) = app
        .call(
            "PUT",
            &format!("/api/roles/{viewer}"),
            &admin,
            Some(json!({ "name": "mechanic" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_exists");

    let (status, body) = app
        .call(
            "PUT",
            &format!("/api/roles/{viewer}"),
            &admin,
            Some(json!({ "name": "viewer", "description": "Read only" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Read only");
    assert_eq!(body["permissions"], json!([]));
}

#[tokio::test]
async fn role_update_replaces_permission_links() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let resource_id = create(
        &app,
        &admin,
        "/api/resources",
        json!({ "name": "sites", "label": "Sites" }),
    )
    .await;
    let read = create(
        &app,
        &admin,
        "/api/permissions",
        json!({ "name": "read:sites", "resourceId": resource_id, "action": "read" }),
    )
    .await;
    let update = create(
        &app,
        &admin,
        "/api/permissions",
        json!({ "name": "update:sites", "resourceId": resource_id, "action": "update" }),
    )
    .await;
    let role = create(
        &app,
        &admin,
        "/api/roles",
        json!({ "name": "planner", "permissions": [read] }),
    )
    .await;

    let (status, body) = app
        .call(
            "PUT",
            &format!("/api/roles/{role}"),
            &admin,
            Some(json!({ "permissions": [update] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permissions"].as_array().expect("permissions").len(), 1);
    assert_eq!(body["permissions"][0]["name"], "update:sites");

    // Omitting `permissions` leaves the links alone.
    let (_, body) = app
        .call(
            "PUT",
            &format!("/api/roles/{role}"),
            &admin,
            Some(json!({ "description": "Plans work" })),
        )
        .await;
    assert_eq!(body["permissions"][0]["name"], "update:sites");
}

#[tokio::test]
async fn site_delete_is_blocked_by_engins() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let north = create(&app, &admin, "/api/sites", json!({ "name": "Depot Nord" })).await;
    let south = create(&app, &admin, "/api/sites", json!({ "name": "Depot Sud" })).await;
    let engin = create(
        &app,
        &admin,
        "/api/engins",
        json!({ "code": "EX-01", "label": "Excavator", "siteId": north }),
    )
    .await;
    create(
        &app,
        &admin,
        "/api/engins",
        json!({ "code": "LD-02", "label": "Loader", "siteId": south, "status": "maintenance" }),
    )
    .await;

    let (status, body) = app
        .call("GET", &format!("/api/engins?siteId={north}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["code"], "EX-01");
    assert_eq!(items[0]["status"], "active");

    let (status, body) = app
        .call(
            "POST",
            "/api/engins",
            &admin,
            Some(json!({ "code": "EX-01", "label": "Dup", "siteId": north })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_exists");

    let (status, body) = app
        .call("DELETE", &format!("/api/sites/{north}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "site is referenced by 1 engins");

    let (status, body) = app
        .call(
            "PUT",
            &format!("/api/engins/{engin}"),
            &admin,
            Some(json!({ "siteId": south, "status": "retired" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["siteId"], south);
    let (status, _) = app
        .call("DELETE", &format!("/api/sites/{north}"), &admin, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn explicit_null_clears_optional_text() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let site_id = create(
        &app,
        &admin,
        "/api/sites",
        json!({ "name": "Depot Nord", "location": "Lille", "description": "old" }),
    )
    .await;
    let uri = format!("/api/sites/{site_id}");

    let (status, site) = app
        .call("PUT", &uri, &admin, Some(json!({ "name": "Depot Nord 2" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(site["description"], "old");

    let (status, site) = app
        .call("PUT", &uri, &admin, Some(json!({ "description": null })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(site["description"].is_null());
    assert_eq!(site["location"], "Lille");

    let role_id = create(
        &app,
        &admin,
        "/api/roles",
        json!({ "name": "viewer", "description": "read only" }),
    )
    .await;
    let (status, role) = app
        .call(
            "PUT",
            &format!("/api/roles/{role_id}"),
            &admin,
            Some(json!({ "description": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(role["description"].is_null());

    let (status, body) = app
        .call(
            "PUT",
            &uri,
            &admin,
            Some(json!({ "location": "x".repeat(300) })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn invalid_input_yields_validation_errors() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .call(
            "POST",
            "/api/resources",
            &admin,
            Some(json!({ "name": "Bad Name", "label": "Bad" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert!(body["message"].as_str().expect("message").starts_with("name"));

    let (status, body) = app
        .call(
            "POST",
            "/api/permissions",
            &admin,
            Some(json!({ "name": "fly:sites", "resourceId": 1, "action": "fly" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app.call("GET", "/api/sites/abc", &admin, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app.call("GET", "/api/engins?siteId=abc", &admin, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert!(body.get("request_id").is_some());

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/sites")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {admin}"))
                .body(Body::from("{not json"))
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "validation_error");
    assert!(body.get("request_id").is_some());
}

#[tokio::test]
async fn registration_and_login_failures() {
    let app = TestApp::new().await;
    app.register("tech@fleet.test", "wrench-1234").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            json!({ "email": "tech@fleet.test", "name": "Again", "password": "wrench-1234" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            json!({ "email": "short@fleet.test", "name": "Short", "password": "abc" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            json!({ "email": "not-an-email", "name": "X", "password": "wrench-1234" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for (email, password) in [
        ("tech@fleet.test", "wrong-password"),
        ("nobody@fleet.test", "wrench-1234"),
    ] {
        let response = app
            .send(json_request(
                "POST",
                "/api/auth/login",
                json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["message"], "invalid email or password");
    }
}
