/// Role name granting every permission.
pub const ADMIN_ROLE: &str = "admin";
/// Role name granting every permission, seeded for the first operator.
pub const SUPER_ADMIN_ROLE: &str = "super-admin";

pub const BYPASS_ROLES: [&str; 2] = [ADMIN_ROLE, SUPER_ADMIN_ROLE];

/// Exact, case-sensitive match against the bypass role names.
pub fn is_bypass_role(name: &str) -> bool {
    BYPASS_ROLES.contains(&name)
}
