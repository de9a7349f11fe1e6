use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::routing::RouterIntoService;
use fleetadmin::app::{AppState, build_router};
use fleetadmin::auth::password::hash_password;
use fleetadmin::config::SessionConfig;
use fleetadmin::model::{NewRole, NewUser};
use fleetadmin::store::RbacStore;
use fleetadmin::store::memory::InMemoryStore;
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "root@fleet.test";
pub const ADMIN_PASSWORD: &str = "correct-horse";

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Router over an in-memory store holding only a `super-admin` user.
pub struct TestApp {
    pub app: RouterIntoService<Body, ()>,
    pub state: AppState,
    pub store: InMemoryStore,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = InMemoryStore::new();
        let hashed = hash_password(ADMIN_PASSWORD).expect("hash");
        let admin = store
            .create_user(NewUser {
                email: ADMIN_EMAIL.to_string(),
                name: "Root".to_string(),
                password_hash: hashed.hash,
                salt: hashed.salt,
            })
            .await
            .expect("admin user");
        let role = store
            .create_role(NewRole {
                name: fleet_authz::SUPER_ADMIN_ROLE.to_string(),
                description: None,
                permission_ids: Vec::new(),
            })
            .await
            .expect("super-admin role");
        store.assign_role(admin.id, role.id).await.expect("assign");
        Self::with_store(store)
    }

    pub fn with_store(store: InMemoryStore) -> Self {
        let state = AppState::new(Arc::new(store.clone()), &SessionConfig::default());
        let app = build_router(state.clone()).into_service();
        Self { app, state, store }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.expect("response")
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .send(crate::http_helpers::json_request(
                "POST",
                "/api/auth/login",
                serde_json::json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::OK, "login {email}");
        let body = read_json(response).await;
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Register through the public endpoint and return the new user id.
    pub async fn register(&self, email: &str, password: &str) -> i64 {
        let response = self
            .send(crate::http_helpers::json_request(
                "POST",
                "/api/auth/register",
                serde_json::json!({ "email": email, "name": "Tech", "password": password }),
            ))
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        read_json(response).await["id"].as_i64().expect("user id")
    }

    /// Authenticated JSON call returning status and parsed body (`Null` when empty).
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> (axum::http::StatusCode, serde_json::Value) {
        let request = match body {
            Some(body) => crate::http_helpers::authed_json_request(method, uri, token, body),
            None => crate::http_helpers::authed_request(method, uri, token),
        };
        let response = self.send(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        if bytes.is_empty() {
            return (status, serde_json::Value::Null);
        }
        (status, serde_json::from_slice(&bytes).expect("json"))
    }
}
