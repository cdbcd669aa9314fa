//! Default permission grants.
//!
//! Warden ships with two roles:
//!
//! | Role  | Default grants                        |
//! |-------|---------------------------------------|
//! | admin | every permission                      |
//! | user  | `read_self`, `update_self`            |
//!
//! The initial migration seeds exactly these rows into `role_permissions`.

use std::collections::HashSet;

use super::models::{Permission, Role};

/// Permissions a role receives on a fresh install.
pub fn default_permissions(role: Role) -> HashSet<Permission> {
    match role {
        Role::Admin => Permission::all().into_iter().collect(),
        Role::User => [Permission::ReadSelf, Permission::UpdateSelf]
            .into_iter()
            .collect(),
    }
}

/// Every default `(role, permission)` pair.
pub fn default_grants() -> Vec<(Role, Permission)> {
    let mut grants: Vec<(Role, Permission)> = Role::all()
        .into_iter()
        .flat_map(|role| {
            default_permissions(role)
                .into_iter()
                .map(move |permission| (role, permission))
        })
        .collect();
    grants.sort();
    grants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_everything() {
        let perms = default_permissions(Role::Admin);
        assert_eq!(perms.len(), 8);
        assert!(perms.contains(&Permission::ManagePermissions));
    }

    #[test]
    fn test_user_defaults() {
        let perms = default_permissions(Role::User);
        assert_eq!(perms.len(), 2);
        assert!(perms.contains(&Permission::ReadSelf));
        assert!(perms.contains(&Permission::UpdateSelf));
        assert!(!perms.contains(&Permission::ReadUser));
    }

    #[test]
    fn test_default_grants_match_seed() {
        let grants = default_grants();
        assert_eq!(grants.len(), 10);
        assert_eq!(grants[0], (Role::Admin, Permission::CreateUser));
    }

    #[test]
    fn test_seed_migration_lists_every_default_grant() {
        let seed = include_str!("../../migrations/20240101000002_seed_role_permissions.sql");
        for (role, permission) in default_grants() {
            let row = format!("('{}', '{}')", role, permission);
            assert!(seed.contains(&row), "seed is missing {}", row);
        }
    }
}
