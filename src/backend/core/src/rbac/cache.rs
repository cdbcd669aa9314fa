//! In-process memoization of permission store reads, keyed by role.
//!
//! Entries are filled lazily on the first lookup of a role and evicted when a
//! grant or revoke touches that role. There is no TTL.
//!
//! Each role owns an async mutex. A miss takes it for {store read -> insert},
//! and a mutation takes it for {store write -> evict}, so an eviction can never
//! be overwritten by a fill that read the store before the write landed. Hits
//! never touch the mutex.

use dashmap::DashMap;
use metrics::counter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

use super::error::RbacResult;
use super::models::{Permission, Role};
use super::store::PermissionStore;

/// A cached permission set.
pub type PermissionSet = Arc<HashSet<Permission>>;

/// Role-keyed permission cache in front of a [`PermissionStore`].
pub struct PermissionCache {
    store: Arc<dyn PermissionStore>,
    entries: DashMap<Role, PermissionSet>,
    locks: HashMap<Role, Mutex<()>>,
}

/// Exclusive hold on one role's cache slot.
///
/// While held, no fill for that role can run. Dropping the guard releases it.
pub struct RoleGuard<'a> {
    role: Role,
    _guard: MutexGuard<'a, ()>,
}

impl RoleGuard<'_> {
    pub fn role(&self) -> Role {
        self.role
    }
}

impl PermissionCache {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        let locks = Role::all()
            .into_iter()
            .map(|role| (role, Mutex::new(())))
            .collect();
        Self {
            store,
            entries: DashMap::new(),
            locks,
        }
    }

    /// The store this cache reads through to.
    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    /// Permissions of `role`, reading the store on a miss.
    pub async fn get(&self, role: Role) -> RbacResult<PermissionSet> {
        if let Some(hit) = self.cached(role) {
            counter!("warden_permission_cache_hits_total", "role" => role.as_str()).increment(1);
            trace!(role = %role, "Permission cache hit");
            return Ok(hit);
        }

        let _guard = self.lock_role(role).await;

        // Another task may have filled the slot while we waited.
        if let Some(hit) = self.cached(role) {
            counter!("warden_permission_cache_hits_total", "role" => role.as_str()).increment(1);
            return Ok(hit);
        }

        counter!("warden_permission_cache_misses_total", "role" => role.as_str()).increment(1);
        let permissions = Arc::new(self.store.list_permissions(role).await?);
        self.entries.insert(role, permissions.clone());

        debug!(
            role = %role,
            count = permissions.len(),
            backend = self.store.backend_name(),
            "Permission cache filled"
        );
        Ok(permissions)
    }

    /// Take the role's lock. Used by mutations so that the store write and
    /// the following eviction are not interleaved with a fill.
    pub async fn lock_role(&self, role: Role) -> RoleGuard<'_> {
        // Every Role variant has a lock; the map is built from Role::all().
        let mutex = &self.locks[&role];
        RoleGuard {
            role,
            _guard: mutex.lock().await,
        }
    }

    /// Evict the role's entry.
    pub async fn invalidate(&self, role: Role) {
        let guard = self.lock_role(role).await;
        self.invalidate_locked(&guard);
    }

    /// Evict the entry of a role whose lock the caller already holds.
    pub fn invalidate_locked(&self, guard: &RoleGuard<'_>) {
        let role = guard.role();
        if self.entries.remove(&role).is_some() {
            counter!("warden_permission_cache_invalidations_total", "role" => role.as_str())
                .increment(1);
            debug!(role = %role, "Permission cache entry invalidated");
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "Permission cache cleared");
    }

    /// Current entry for `role` without touching the store.
    pub fn cached(&self, role: Role) -> Option<PermissionSet> {
        self.entries.get(&role).map(|entry| entry.value().clone())
    }

    /// Number of roles with a cached entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("backend", &self.store.backend_name())
            .field("entries", &self.entries.len())
            .finish()
    }
}
