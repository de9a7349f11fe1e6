//! Session and self-service handlers under `/api/auth`.
//!
//! # Purpose
//! Login, registration and logout, plus the "who am I / what may I do"
//! queries the admin UI uses to shape itself. Except `login` and `register`,
//! every handler requires a valid session via [`CurrentUser`].
//!
//! # Security considerations
//! - Login failures return one generic message for unknown email and wrong
//!   password alike.
//! - Passwords and tokens are never logged.
use crate::api::error::{
    ApiError, api_already_exists, api_internal, api_internal_message, api_store_error,
    api_unauthorized,
};
use crate::api::found;
use crate::api::types::{
    AuthPermissionsResponse, AuthRolesResponse, ErrorResponse, LoginRequest, LoginResponse,
    MeResponse, RegisterRequest,
};
use crate::api::validate::ValidatedJson;
use crate::app::AppState;
use crate::auth::CurrentUser;
use crate::auth::password::{hash_password, verify_password};
use crate::model::{NewUser, User};
use crate::observability;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};

const LOGIN_FAILED: &str = "invalid email or password";

#[utoipa::path(
    get,
    path = "/api/auth/permissions",
    tag = "auth",
    responses(
        (status = 200, description = "Effective permissions of the session user", body = AuthPermissionsResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub(crate) async fn my_permissions(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AuthPermissionsResponse>, ApiError> {
    let set = state
        .resolver
        .get_user_permissions(user.id)
        .await
        .map_err(|err| api_internal("failed to resolve permissions", &err))?;
    Ok(Json(AuthPermissionsResponse {
        permissions: set.to_strings(),
        bypass: set.is_bypass(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/roles",
    tag = "auth",
    responses(
        (status = 200, description = "Roles of the session user", body = AuthRolesResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub(crate) async fn my_roles(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AuthRolesResponse>, ApiError> {
    let roles = state
        .store
        .user_roles(user.id)
        .await
        .map_err(|err| api_internal("failed to load roles", &err))?;
    Ok(Json(AuthRolesResponse { roles }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Session user profile", body = MeResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub(crate) async fn me(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, ApiError> {
    let profile = found(state.store.get_user(user.id).await, "user not found")?;
    let roles = state
        .store
        .user_roles(user.id)
        .await
        .map_err(|err| api_internal("failed to load roles", &err))?;
    let set = state
        .resolver
        .get_user_permissions(user.id)
        .await
        .map_err(|err| api_internal("failed to resolve permissions", &err))?;
    Ok(Json(MeResponse {
        user: profile,
        roles: roles.into_iter().map(|role| role.name).collect(),
        permissions: set.to_strings(),
        bypass: set.is_bypass(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued; also set as the fleet_session cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let credentials = state
        .store
        .find_user_credentials(&body.email)
        .await
        .map_err(|err| api_internal("failed to load credentials", &err))?;
    let Some(credentials) = credentials else {
        observability::record_login("failure");
        return Err(api_unauthorized(LOGIN_FAILED));
    };
    let verified = verify_password(&body.password, &credentials.password_hash).map_err(|err| {
        tracing::error!(user_id = credentials.user.id, error = %err, "stored password hash unreadable");
        api_internal_message("failed to verify credentials")
    })?;
    if !verified {
        tracing::info!(user_id = credentials.user.id, "login rejected");
        observability::record_login("failure");
        return Err(api_unauthorized(LOGIN_FAILED));
    }
    let user = credentials.user;
    let session = state.sessions.mint(user.id, &user.email).map_err(|err| {
        tracing::error!(user_id = user.id, error = %err, "failed to mint session");
        api_internal_message("failed to issue session")
    })?;
    tracing::info!(user_id = user.id, "login succeeded");
    observability::record_login("success");
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, state.sessions.session_cookie(&session.token));
    let body = LoginResponse {
        user,
        token: session.token,
        expires_at: session.expires_at,
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 400, description = "Invalid registration", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub(crate) async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let existing = state
        .store
        .find_user_credentials(&body.email)
        .await
        .map_err(|err| api_internal("failed to check email", &err))?;
    if existing.is_some() {
        return Err(api_already_exists("email already registered"));
    }
    let hashed = hash_password(&body.password).map_err(|err| {
        tracing::error!(error = %err, "failed to hash password");
        api_internal_message("failed to register user")
    })?;
    let user = state
        .store
        .create_user(NewUser {
            email: body.email,
            name: body.name,
            password_hash: hashed.hash,
            salt: hashed.salt,
        })
        .await
        .map_err(|err| api_store_error("failed to register user", err))?;
    tracing::info!(user_id = user.id, "user registered");
    match state.store.count_users().await {
        Ok(count) => observability::record_user_count(count),
        Err(err) => tracing::warn!(error = %err, "failed to refresh user gauge"),
    }
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Session cookie cleared"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub(crate) async fn logout(user: CurrentUser, State(state): State<AppState>) -> Response {
    tracing::info!(user_id = user.id, "logout");
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, state.sessions.clear_cookie());
    (StatusCode::NO_CONTENT, headers).into_response()
}
