//! Effective permission set for a single user.
//!
//! # Purpose
//! Flattens the permissions reachable through a user's roles into one
//! deduplicated, ordered set, and records whether a bypass role was present.
//!
//! # Key invariants
//! - The set is the union over all roles; duplicates collapse.
//! - A bypass set allows every `(action, resource)` pair, whatever it contains.
use crate::{Action, PermissionKey};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePermissions {
    keys: BTreeSet<PermissionKey>,
    bypass: bool,
}

impl EffectivePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = PermissionKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            bypass: false,
        }
    }

    /// Build the set from `(role name, granted keys)` pairs.
    ///
    /// Any bypass role name marks the whole set as bypass.
    pub fn from_roles<'a, I, K>(roles: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, K)>,
        K: IntoIterator<Item = PermissionKey>,
    {
        let mut set = Self::new();
        for (role, keys) in roles {
            if crate::is_bypass_role(role) {
                set.bypass = true;
            }
            set.keys.extend(keys);
        }
        set
    }

    pub fn insert(&mut self, key: PermissionKey) -> bool {
        self.keys.insert(key)
    }

    pub fn union(&mut self, other: &EffectivePermissions) {
        self.keys.extend(other.keys.iter().cloned());
        self.bypass |= other.bypass;
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    pub fn allows(&self, action: Action, resource: &str) -> bool {
        if self.bypass {
            return true;
        }
        self.keys
            .iter()
            .any(|key| key.action == action && key.resource == resource)
    }

    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionKey> {
        self.keys.iter()
    }

    /// Sorted `action:resource` strings.
    pub fn to_strings(&self) -> Vec<String> {
        self.keys.iter().map(PermissionKey::as_string).collect()
    }
}

impl FromIterator<PermissionKey> for EffectivePermissions {
    fn from_iter<T: IntoIterator<Item = PermissionKey>>(iter: T) -> Self {
        Self::from_keys(iter)
    }
}
