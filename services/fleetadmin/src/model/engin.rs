//! Equipment ("engins") attached to a site.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum EnginStatus {
    #[default]
    Active,
    Maintenance,
    Retired,
}

impl EnginStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnginStatus::Active => "active",
            EnginStatus::Maintenance => "maintenance",
            EnginStatus::Retired => "retired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EnginStatus::Active),
            "maintenance" => Some(EnginStatus::Maintenance),
            "retired" => Some(EnginStatus::Retired),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Engin {
    pub id: i64,
    pub code: String,
    pub label: String,
    pub site_id: i64,
    pub status: EnginStatus,
}

#[derive(Debug, Clone)]
pub struct NewEngin {
    pub code: String,
    pub label: String,
    pub site_id: i64,
    pub status: EnginStatus,
}

#[derive(Debug, Clone, Default)]
pub struct EnginPatch {
    pub code: Option<String>,
    pub label: Option<String>,
    pub site_id: Option<i64>,
    pub status: Option<EnginStatus>,
}
