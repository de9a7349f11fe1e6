//! Protectable resource names.
//!
//! # Purpose
//! Resource names (`sites`, `user_roles`, ...) are the second half of every
//! permission key. They are restricted to lowercase ASCII letters, digits and
//! underscores, starting with a letter, so keys stay unambiguous when split on
//! the first `:`.
//!
//! # Examples
//! ```rust
//! use fleet_authz::ResourceName;
//!
//! let name = ResourceName::new("user_roles").expect("valid");
//! assert_eq!(name.as_str(), "user_roles");
//! assert!(ResourceName::new("User-Roles").is_err());
//! ```
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};

const MAX_RESOURCE_NAME_LEN: usize = 64;

/// Validated resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    /// Validate and wrap a resource name.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidResourceName`] when the value is empty, too long,
    ///   does not start with a lowercase letter, or contains characters other
    ///   than `[a-z0-9_]`.
    pub fn new(value: impl Into<String>) -> AuthzResult<Self> {
        let value = value.into();
        validate_resource_name(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceName {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceName> for String {
    fn from(value: ResourceName) -> Self {
        value.0
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn validate_resource_name(value: &str) -> AuthzResult<()> {
    let invalid = || AuthzError::InvalidResourceName(value.to_string());
    if value.is_empty() || value.len() > MAX_RESOURCE_NAME_LEN {
        return Err(invalid());
    }
    let mut chars = value.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return Err(invalid());
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(invalid());
    }
    Ok(())
}
