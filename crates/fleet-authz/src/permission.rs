//! Canonical `action:resource` permission keys.
//!
//! # Purpose
//! A [`PermissionKey`] is the flattened form of one granted permission. It is
//! what the effective permission set stores and what `/auth/permissions`
//! returns to clients.
//!
//! # Key invariants
//! - Rendered as `"<action>:<resource>"`, e.g. `read:sites`.
//! - Parsing splits on the first colon and validates both halves.
use crate::{Action, AuthzError, AuthzResult, ResourceName};
use serde::{Deserialize, Serialize};

/// A granted action on a named resource.
///
/// # Example
/// ```rust
/// use fleet_authz::{Action, PermissionKey};
///
/// let key = PermissionKey::new(Action::Update, "engins");
/// assert_eq!(key.to_string(), "update:engins");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    pub action: Action,
    pub resource: String,
}

impl PermissionKey {
    pub fn new(action: Action, resource: impl Into<String>) -> Self {
        Self {
            action,
            resource: resource.into(),
        }
    }

    /// Render the key as `action:resource`.
    pub fn as_string(&self) -> String {
        format!("{}:{}", self.action.as_str(), self.resource)
    }

    /// Parse an `action:resource` string.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidPermission`] if the string has no colon.
    /// - [`AuthzError::InvalidAction`] if the action is unknown.
    /// - [`AuthzError::InvalidResourceName`] if the resource violates the grammar.
    pub fn parse(value: &str) -> AuthzResult<Self> {
        value.parse()
    }
}

impl std::str::FromStr for PermissionKey {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (action, resource) = value
            .split_once(':')
            .ok_or_else(|| AuthzError::InvalidPermission(value.to_string()))?;
        let action = action.parse::<Action>()?;
        let resource = ResourceName::new(resource)?;
        Ok(Self::new(action, String::from(resource)))
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_key_rendering() {
        let key = PermissionKey::new(Action::Read, "sites");
        assert_eq!(key.as_string(), "read:sites");
    }

    #[test]
    fn parse_recovers_action_and_resource() {
        let parsed = PermissionKey::parse("delete:user_roles").expect("parse");
        assert_eq!(parsed.action, Action::Delete);
        assert_eq!(parsed.resource, "user_roles");
    }

    #[test]
    fn parse_rejects_missing_colon() {
        let err = PermissionKey::parse("read").expect_err("missing resource");
        assert!(matches!(err, AuthzError::InvalidPermission(_)));
    }

    #[test]
    fn parse_rejects_unknown_action() {
        let err = PermissionKey::parse("write:sites").expect_err("bad action");
        assert!(matches!(err, AuthzError::InvalidAction(_)));
    }

    #[test]
    fn parse_rejects_bad_resource() {
        let err = PermissionKey::parse("read:Sites").expect_err("bad resource");
        assert!(matches!(err, AuthzError::InvalidResourceName(_)));
    }
}
