//! Fleet-admin authentication and authorization modules.
//!
//! # Purpose
//! Groups session tokens, password hashing, the permission resolver, the
//! per-request identity extractor, and the route guard layer.
pub mod current_user;
pub mod guard;
pub mod password;
pub mod resolver;
pub mod session;

pub use current_user::CurrentUser;
pub use guard::RequirePermission;
pub use resolver::PermissionResolver;
