//! Permission records and role links.
use fleet_authz::Action;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub resource_id: i64,
    #[schema(value_type = String, example = "read")]
    pub action: Action,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    pub resource_id: i64,
    pub action: Action,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionPatch {
    pub name: Option<String>,
    pub resource_id: Option<i64>,
    pub action: Option<Action>,
    pub description: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RolePermission {
    pub id: i64,
    pub role_id: i64,
    pub permission_id: i64,
}
