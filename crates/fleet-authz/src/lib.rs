//! Fleet-admin authorization primitives shared by the admin service and its tests.
//!
//! # Purpose
//! Centralizes the permission registry: the canonical action catalog, the
//! resource-name grammar, `action:resource` permission keys, bypass roles, and
//! the effective permission set computed for a user.
//!
//! # How it fits
//! The admin service loads role/permission graphs from storage and flattens
//! them into [`EffectivePermissions`]; the route guard asks it (or the store's
//! existence query) whether an `(action, resource)` pair is granted.
//!
//! # Key invariants
//! - Permission keys are `action:resource`, with `resource` a lowercase name.
//! - A user's effective set is the union of the permissions of all its roles.
//! - Holders of a bypass role (`admin`, `super-admin`) are granted everything.
//!
//! # Examples
//! ```rust
//! use fleet_authz::{Action, EffectivePermissions, PermissionKey};
//!
//! let perms = EffectivePermissions::from_keys([PermissionKey::new(Action::Read, "sites")]);
//! assert!(perms.allows(Action::Read, "sites"));
//! assert!(!perms.allows(Action::Delete, "sites"));
//! ```

mod action;
mod errors;
mod permission;
mod resource;
mod roles;
mod set;

pub use action::Action;
pub use errors::{AuthzError, AuthzResult};
pub use permission::PermissionKey;
pub use resource::{ResourceName, validate_resource_name};
pub use roles::{ADMIN_ROLE, BYPASS_ROLES, SUPER_ADMIN_ROLE, is_bypass_role};
pub use set::EffectivePermissions;
