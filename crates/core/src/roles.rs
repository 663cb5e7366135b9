//! Well-known role names and permission codes.
//!
//! These must match the seed data in `20261001000002_create_rbac_tables.sql`.
//! Permission codes follow the `resource:action` convention.

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "gestionnaire";
pub const ROLE_AGENT: &str = "agent";
pub const ROLE_VIEWER: &str = "lecteur";

/// Roles allowed through the admin-only extractor.
pub const ADMIN_ROLES: &[&str] = &[ROLE_SUPER_ADMIN, ROLE_ADMIN];

pub const PERM_TENANTS_READ: &str = "tenants:read";
pub const PERM_TENANTS_MANAGE: &str = "tenants:manage";
pub const PERM_USERS_MANAGE: &str = "users:manage";

pub const PERM_BUDGET_READ: &str = "budget:read";
pub const PERM_BUDGET_WRITE: &str = "budget:write";
pub const PERM_BUDGET_APPROVE: &str = "budget:approve";
pub const PERM_ALLOCATION_REQUEST: &str = "allocation:request";
pub const PERM_ALLOCATION_APPROVE: &str = "allocation:approve";
pub const PERM_ALLOCATION_EXECUTE: &str = "allocation:execute";
pub const PERM_TRANSACTION_WRITE: &str = "transaction:write";
pub const PERM_TRANSACTION_VALIDATE: &str = "transaction:validate";

pub const PERM_HOUSING_READ: &str = "housing:read";
pub const PERM_HOUSING_WRITE: &str = "housing:write";
pub const PERM_HOUSING_PROCESS: &str = "housing:process";

pub const PERM_RESTAURATION_READ: &str = "restauration:read";
pub const PERM_RESTAURATION_WRITE: &str = "restauration:write";
pub const PERM_TICKETS_SCAN: &str = "tickets:scan";

pub const PERM_TRANSPORT_READ: &str = "transport:read";
pub const PERM_TRANSPORT_WRITE: &str = "transport:write";

pub const PERM_REPORTS_READ: &str = "reports:read";

/// Every permission code seeded into the `permissions` table.
pub const ALL_PERMISSIONS: &[&str] = &[
    PERM_TENANTS_READ,
    PERM_TENANTS_MANAGE,
    PERM_USERS_MANAGE,
    PERM_BUDGET_READ,
    PERM_BUDGET_WRITE,
    PERM_BUDGET_APPROVE,
    PERM_ALLOCATION_REQUEST,
    PERM_ALLOCATION_APPROVE,
    PERM_ALLOCATION_EXECUTE,
    PERM_TRANSACTION_WRITE,
    PERM_TRANSACTION_VALIDATE,
    PERM_HOUSING_READ,
    PERM_HOUSING_WRITE,
    PERM_HOUSING_PROCESS,
    PERM_RESTAURATION_READ,
    PERM_RESTAURATION_WRITE,
    PERM_TICKETS_SCAN,
    PERM_TRANSPORT_READ,
    PERM_TRANSPORT_WRITE,
    PERM_REPORTS_READ,
];

/// Whether the role bypasses per-permission checks entirely.
pub fn is_super_admin(role: &str) -> bool {
    role == ROLE_SUPER_ADMIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_codes_are_resource_action_pairs() {
        for code in ALL_PERMISSIONS {
            let parts: Vec<&str> = code.split(':').collect();
            assert_eq!(parts.len(), 2, "{code} must be resource:action");
            assert!(parts.iter().all(|p| !p.is_empty()));
        }
    }

    #[test]
    fn permission_codes_are_unique() {
        let mut sorted = ALL_PERMISSIONS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ALL_PERMISSIONS.len());
    }

    #[test]
    fn only_super_admin_bypasses() {
        assert!(is_super_admin(ROLE_SUPER_ADMIN));
        assert!(!is_super_admin(ROLE_ADMIN));
    }
}
