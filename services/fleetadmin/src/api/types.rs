//! Request and response bodies for the fleet-admin HTTP API.
//!
//! Request types derive `garde::Validate`; handlers receive them already
//! validated through [`crate::api::validate::ValidatedJson`].
use crate::model::{
    Engin, EnginStatus, Permission, Resource, Role, RoleDetail, RolePermission, Site, User,
    UserRole,
};
use fleet_authz::{Action, validate_resource_name};
use garde::Validate;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct FeatureFlags {
    pub durable_storage: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub service: String,
    pub api_version: String,
    pub storage_backend: String,
    pub features: FeatureFlags,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

fn resource_name(value: &str, _ctx: &()) -> garde::Result {
    validate_resource_name(value).map_err(|err| garde::Error::new(err.to_string()))
}

fn optional_resource_name(value: &Option<String>, ctx: &()) -> garde::Result {
    match value {
        Some(name) => resource_name(name, ctx),
        None => Ok(()),
    }
}

/// Field absent: `None`. Explicit `null`: `Some(None)`, which clears the value.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn nullable_text(value: &Option<Option<String>>, max: usize) -> garde::Result {
    match value {
        Some(Some(text)) if text.chars().count() > max => Err(garde::Error::new(format!(
            "length is greater than {max}"
        ))),
        _ => Ok(()),
    }
}

fn nullable_description(value: &Option<Option<String>>, _ctx: &()) -> garde::Result {
    nullable_text(value, 512)
}

fn nullable_location(value: &Option<Option<String>>, _ctx: &()) -> garde::Result {
    nullable_text(value, 256)
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCreateRequest {
    #[garde(custom(resource_name))]
    #[schema(example = "sites")]
    pub name: String,
    #[garde(length(min = 1, max = 128))]
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUpdateRequest {
    #[garde(custom(optional_resource_name))]
    pub name: Option<String>,
    #[garde(length(min = 1, max = 128))]
    pub label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCreateRequest {
    #[garde(length(min = 1, max = 128))]
    #[schema(example = "read:sites")]
    pub name: String,
    #[garde(range(min = 1))]
    pub resource_id: i64,
    #[garde(skip)]
    #[schema(value_type = String, example = "read")]
    pub action: Action,
    #[garde(length(max = 512))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PermissionUpdateRequest {
    #[garde(length(min = 1, max = 128))]
    pub name: Option<String>,
    #[garde(range(min = 1))]
    pub resource_id: Option<i64>,
    #[garde(skip)]
    #[schema(value_type = Option<String>)]
    pub action: Option<Action>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[garde(custom(nullable_description))]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoleCreateRequest {
    #[garde(length(min = 1, max = 64))]
    #[schema(example = "viewer")]
    pub name: String,
    #[garde(length(max = 512))]
    pub description: Option<String>,
    /// Permission ids to link to the new role.
    #[serde(default)]
    #[garde(skip)]
    pub permissions: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdateRequest {
    #[garde(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[garde(custom(nullable_description))]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
    /// When present, replaces the role's permission links.
    #[garde(skip)]
    pub permissions: Option<Vec<i64>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleCreateRequest {
    #[garde(range(min = 1))]
    pub user_id: i64,
    #[garde(range(min = 1))]
    pub role_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[garde(email, length(max = 254))]
    pub email: String,
    #[garde(length(min = 1, max = 128))]
    pub name: String,
    #[garde(length(min = 8, max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[garde(length(min = 1, max = 254))]
    pub email: String,
    #[garde(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SiteCreateRequest {
    #[garde(length(min = 1, max = 128))]
    pub name: String,
    #[garde(length(max = 256))]
    pub location: Option<String>,
    #[garde(length(max = 512))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SiteUpdateRequest {
    #[garde(length(min = 1, max = 128))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[garde(custom(nullable_location))]
    #[schema(value_type = Option<String>, nullable)]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[garde(custom(nullable_description))]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnginCreateRequest {
    #[garde(length(min = 1, max = 64))]
    #[schema(example = "EX-042")]
    pub code: String,
    #[garde(length(min = 1, max = 128))]
    pub label: String,
    #[garde(range(min = 1))]
    pub site_id: i64,
    #[garde(skip)]
    pub status: Option<EnginStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnginUpdateRequest {
    #[garde(length(min = 1, max = 64))]
    pub code: Option<String>,
    #[garde(length(min = 1, max = 128))]
    pub label: Option<String>,
    #[garde(range(min = 1))]
    pub site_id: Option<i64>,
    #[garde(skip)]
    pub status: Option<EnginStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EnginListQuery {
    /// Only list engins attached to this site.
    pub site_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ResourceListResponse {
    pub items: Vec<Resource>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct PermissionListResponse {
    pub items: Vec<Permission>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RoleListResponse {
    pub items: Vec<RoleDetail>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserRoleListResponse {
    pub items: Vec<UserRole>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserListResponse {
    pub items: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SiteListResponse {
    pub items: Vec<Site>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct EnginListResponse {
    pub items: Vec<Engin>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RolePermissionResponse {
    pub link: RolePermission,
}

/// Effective permissions of the acting user.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthPermissionsResponse {
    /// Sorted `action:resource` keys.
    #[schema(example = json!(["read:sites", "update:engins"]))]
    pub permissions: Vec<String>,
    /// True when an `admin`/`super-admin` role grants everything.
    pub bypass: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AuthRolesResponse {
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub bypass: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    pub expires_at: i64,
}
