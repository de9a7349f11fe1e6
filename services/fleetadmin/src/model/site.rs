//! Maintenance sites.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSite {
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SitePatch {
    pub name: Option<String>,
    pub location: Option<Option<String>>,
    pub description: Option<Option<String>>,
}
