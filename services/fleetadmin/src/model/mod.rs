//! Fleet-admin data model module.
//!
//! # Purpose
//! Re-exports the RBAC records (users, roles, permissions, resources and their
//! join links) and the fleet records (sites, engins) shared by the API and
//! store layers.
mod engin;
mod permission;
mod resource;
mod role;
mod site;
mod user;

pub use engin::{Engin, EnginPatch, EnginStatus, NewEngin};
pub use permission::{NewPermission, Permission, PermissionPatch, RolePermission};
pub use resource::{NewResource, Resource, ResourcePatch};
pub use role::{NewRole, Role, RoleDetail, RolePatch, UserRole};
pub use site::{NewSite, Site, SitePatch};
pub use user::{NewUser, User, UserCredentials};
