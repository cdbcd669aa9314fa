//! Durable role -> permission storage.
//!
//! The store is the source of truth for grants. Two backends are provided:
//! PostgreSQL for the server and an in-memory map for tests and local tooling.

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::error::{RbacError, RbacResult};
use super::models::{Permission, Role, RolePermission};
use super::roles;
use crate::db::RolePermissionRow;

// ═══════════════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Storage backend for role permission grants.
///
/// Every method reports backend failures as [`RbacError::StoreUnavailable`].
/// A role without grants yields an empty set, never an error.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Permissions currently granted to `role`.
    async fn list_permissions(&self, role: Role) -> RbacResult<HashSet<Permission>>;

    /// Grant `permission` to `role`. Granting an existing pair succeeds.
    async fn grant(&self, role: Role, permission: Permission) -> RbacResult<()>;

    /// Revoke `permission` from `role`. Revoking a missing pair succeeds.
    async fn revoke(&self, role: Role, permission: Permission) -> RbacResult<()>;

    /// Every grant record.
    async fn list_all(&self) -> RbacResult<Vec<RolePermission>>;

    /// Short backend name used in logs and error messages.
    fn backend_name(&self) -> &'static str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PostgreSQL
// ═══════════════════════════════════════════════════════════════════════════════

/// Permission store backed by the `role_permissions` table.
#[derive(Clone)]
pub struct PgPermissionStore {
    pool: PgPool,
}

impl PgPermissionStore {
    const BACKEND: &'static str = "postgres";

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn unavailable(err: sqlx::Error) -> RbacError {
        RbacError::store_unavailable(Self::BACKEND, err.to_string())
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn list_permissions(&self, role: Role) -> RbacResult<HashSet<Permission>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT permission FROM role_permissions WHERE role = $1")
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(Self::unavailable)?;

        let permissions = names
            .into_iter()
            .filter_map(|name| match name.parse::<Permission>() {
                Ok(permission) => Some(permission),
                Err(_) => {
                    warn!(role = %role, permission = %name, "Skipping unknown permission row");
                    None
                }
            })
            .collect();

        Ok(permissions)
    }

    async fn grant(&self, role: Role, permission: Permission) -> RbacResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role, permission)
            VALUES ($1, $2)
            ON CONFLICT (role, permission) DO NOTHING
            "#,
        )
        .bind(role.as_str())
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(Self::unavailable)?;

        debug!(
            role = %role,
            permission = %permission,
            inserted = result.rows_affected(),
            "Grant applied"
        );
        Ok(())
    }

    async fn revoke(&self, role: Role, permission: Permission) -> RbacResult<()> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role = $1 AND permission = $2")
                .bind(role.as_str())
                .bind(permission.as_str())
                .execute(&self.pool)
                .await
                .map_err(Self::unavailable)?;

        debug!(
            role = %role,
            permission = %permission,
            deleted = result.rows_affected(),
            "Revoke applied"
        );
        Ok(())
    }

    async fn list_all(&self) -> RbacResult<Vec<RolePermission>> {
        let rows = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT id, role, permission, created_at, updated_at
            FROM role_permissions
            ORDER BY role, permission
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Self::unavailable)?;

        let records = rows
            .into_iter()
            .filter_map(|row| {
                let role = row.role.parse::<Role>();
                let permission = row.permission.parse::<Permission>();
                match (role, permission) {
                    (Ok(role), Ok(permission)) => Some(RolePermission {
                        id: row.id,
                        role,
                        permission,
                        created_at: row.created_at,
                        updated_at: row.updated_at,
                    }),
                    _ => {
                        warn!(id = %row.id, role = %row.role, permission = %row.permission, "Skipping unknown grant row");
                        None
                    }
                }
            })
            .collect();

        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        Self::BACKEND
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════════════════════════════════════════

/// Process-local permission store.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    grants: RwLock<HashMap<(Role, Permission), RolePermission>>,
}

impl MemoryPermissionStore {
    /// An empty store: no role holds any permission.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with the same grants as the initial migration.
    pub fn with_default_grants() -> Self {
        Self::with_grants(roles::default_grants())
    }

    /// A store seeded with the given pairs.
    pub fn with_grants(grants: impl IntoIterator<Item = (Role, Permission)>) -> Self {
        let map = grants
            .into_iter()
            .map(|(role, permission)| ((role, permission), RolePermission::new(role, permission)))
            .collect();
        Self {
            grants: RwLock::new(map),
        }
    }

    /// Number of stored grant records.
    pub fn len(&self) -> usize {
        self.grants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.read().is_empty()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn list_permissions(&self, role: Role) -> RbacResult<HashSet<Permission>> {
        Ok(self
            .grants
            .read()
            .keys()
            .filter(|(r, _)| *r == role)
            .map(|(_, p)| *p)
            .collect())
    }

    async fn grant(&self, role: Role, permission: Permission) -> RbacResult<()> {
        self.grants
            .write()
            .entry((role, permission))
            .or_insert_with(|| RolePermission::new(role, permission));
        Ok(())
    }

    async fn revoke(&self, role: Role, permission: Permission) -> RbacResult<()> {
        self.grants.write().remove(&(role, permission));
        Ok(())
    }

    async fn list_all(&self) -> RbacResult<Vec<RolePermission>> {
        let mut records: Vec<RolePermission> = self.grants.read().values().cloned().collect();
        records.sort_by_key(|r| (r.role, r.permission));
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_role_is_empty_set() {
        let store = MemoryPermissionStore::new();
        let perms = store.list_permissions(Role::User).await.unwrap();
        assert!(perms.is_empty());
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let store = MemoryPermissionStore::new();
        store.grant(Role::User, Permission::ReadUser).await.unwrap();
        let first = store.list_all().await.unwrap();

        store.grant(Role::User, Permission::ReadUser).await.unwrap();
        let second = store.list_all().await.unwrap();

        assert_eq!(second.len(), 1);
        // The original record survives the second grant untouched.
        assert_eq!(first[0].id, second[0].id);
    }

    #[tokio::test]
    async fn test_revoke_missing_pair_succeeds() {
        let store = MemoryPermissionStore::new();
        store.revoke(Role::Admin, Permission::DeleteUser).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_default_grants() {
        let store = MemoryPermissionStore::with_default_grants();
        assert_eq!(store.len(), 10);

        let user = store.list_permissions(Role::User).await.unwrap();
        assert_eq!(user, roles::default_permissions(Role::User));
    }

    #[tokio::test]
    async fn test_list_all_is_ordered() {
        let store = MemoryPermissionStore::with_grants([
            (Role::User, Permission::ReadSelf),
            (Role::Admin, Permission::ReadUser),
            (Role::Admin, Permission::CreateUser),
        ]);
        let records = store.list_all().await.unwrap();
        let pairs: Vec<_> = records.iter().map(|r| (r.role, r.permission)).collect();
        assert_eq!(
            pairs,
            vec![
                (Role::Admin, Permission::CreateUser),
                (Role::Admin, Permission::ReadUser),
                (Role::User, Permission::ReadSelf),
            ]
        );
    }
}
