//! Protectable resource records.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: i64,
    /// Lowercase identifier used in permission keys (`read:<name>`).
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePatch {
    pub name: Option<String>,
    pub label: Option<String>,
}
