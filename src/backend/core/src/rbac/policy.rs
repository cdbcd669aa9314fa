//! Authorization decisions and permission administration.
//!
//! [`PermissionService`] answers "does role R hold permission P?" through the
//! [`PermissionCache`], and applies grants and revokes so that the cache never
//! serves a set older than the last successful mutation of that role.

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::{PermissionCache, PermissionSet};
use super::error::RbacResult;
use super::models::{Permission, Role, RolePermission};
use super::store::PermissionStore;

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The action is allowed.
    Allow,
    /// The action is denied, with a reason.
    Deny(String),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny(_) => "deny",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared entry point for permission checks and grant administration.
///
/// Constructed once at startup and shared through `Arc`.
#[derive(Debug)]
pub struct PermissionService {
    cache: PermissionCache,
}

impl PermissionService {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            cache: PermissionCache::new(store),
        }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decisions
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `role` currently holds `permission`.
    ///
    /// A role without grants yields `Ok(false)`. Store failures are returned
    /// as errors so that callers can tell them apart from a denial.
    pub async fn has_permission(&self, role: Role, permission: Permission) -> RbacResult<bool> {
        let permissions = self.cache.get(role).await?;
        Ok(permissions.contains(&permission))
    }

    /// Evaluate a check into a decision. Store failures deny.
    pub async fn check(&self, role: Role, permission: Permission) -> PolicyDecision {
        let decision = match self.has_permission(role, permission).await {
            Ok(true) => PolicyDecision::Allow,
            Ok(false) => PolicyDecision::Deny(format!(
                "Role '{}' does not have permission '{}'",
                role, permission
            )),
            Err(err) => {
                warn!(
                    role = %role,
                    permission = %permission,
                    error = %err,
                    "Permission check failed, denying"
                );
                PolicyDecision::Deny("Permission data unavailable".to_string())
            }
        };

        counter!("warden_authz_decisions_total", "decision" => decision.label()).increment(1);
        debug!(role = %role, permission = %permission, decision = decision.label(), "Policy evaluated");
        decision
    }

    /// Yes/no form of [`check`](Self::check). Never `true` on a store failure.
    pub async fn is_allowed(&self, role: Role, permission: Permission) -> bool {
        self.check(role, permission).await.is_allowed()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Cached permission set of `role`.
    pub async fn get(&self, role: Role) -> RbacResult<PermissionSet> {
        self.cache.get(role).await
    }

    /// Permissions of `role`, sorted.
    pub async fn list_permissions(&self, role: Role) -> RbacResult<Vec<Permission>> {
        let mut permissions: Vec<Permission> = self.cache.get(role).await?.iter().copied().collect();
        permissions.sort();
        Ok(permissions)
    }

    /// Every grant record, read straight from the store.
    pub async fn list_all(&self) -> RbacResult<Vec<RolePermission>> {
        self.cache.store().list_all().await
    }

    /// The closed permission enumeration.
    pub fn all_permissions(&self) -> Vec<Permission> {
        Permission::all().to_vec()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `permission` to `role` and evict the role's cache entry.
    pub async fn grant(&self, role: Role, permission: Permission) -> RbacResult<()> {
        let guard = self.cache.lock_role(role).await;
        let result = self.cache.store().grant(role, permission).await;
        // Evict on failure too: the write may have landed before the error surfaced.
        self.cache.invalidate_locked(&guard);
        drop(guard);

        result?;
        info!(role = %role, permission = %permission, "Permission granted");
        Ok(())
    }

    /// Revoke `permission` from `role` and evict the role's cache entry.
    pub async fn revoke(&self, role: Role, permission: Permission) -> RbacResult<()> {
        let guard = self.cache.lock_role(role).await;
        let result = self.cache.store().revoke(role, permission).await;
        self.cache.invalidate_locked(&guard);
        drop(guard);

        result?;
        info!(role = %role, permission = %permission, "Permission revoked");
        Ok(())
    }

    /// Evict the cache entry of `role`.
    pub async fn invalidate(&self, role: Role) {
        self.cache.invalidate(role).await;
    }

    /// Evict every cache entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
