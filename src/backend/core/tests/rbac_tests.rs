//! Integration tests for permission checks, grants, and cache coherence.
//!
//! Tests cover:
//! - Reads after grant and revoke observe the mutation
//! - Idempotent grant and revoke
//! - Cache hits skipping the store
//! - Store failures never producing an allow
//! - Concurrent grants racing readers
//! - A grant waiting out an in-flight fill for the same role

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use warden_core::rbac::{
    MemoryPermissionStore, Permission, PermissionService, PermissionStore, PolicyDecision,
    RbacError, RbacResult, Role, RolePermission,
};

// ============================================================================
// Test store
// ============================================================================

/// Memory store that counts reads and can be switched into a failing mode.
#[derive(Default)]
struct CountingStore {
    inner: MemoryPermissionStore,
    reads: AtomicUsize,
    failing: AtomicBool,
}

impl CountingStore {
    fn with_grants(grants: impl IntoIterator<Item = (Role, Permission)>) -> Self {
        Self {
            inner: MemoryPermissionStore::with_grants(grants),
            ..Default::default()
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> RbacResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RbacError::store_unavailable("counting", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PermissionStore for CountingStore {
    async fn list_permissions(&self, role: Role) -> RbacResult<HashSet<Permission>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.list_permissions(role).await
    }

    async fn grant(&self, role: Role, permission: Permission) -> RbacResult<()> {
        self.check()?;
        self.inner.grant(role, permission).await
    }

    async fn revoke(&self, role: Role, permission: Permission) -> RbacResult<()> {
        self.check()?;
        self.inner.revoke(role, permission).await
    }

    async fn list_all(&self) -> RbacResult<Vec<RolePermission>> {
        self.check()?;
        self.inner.list_all().await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

fn service_with(grants: Vec<(Role, Permission)>) -> (Arc<CountingStore>, PermissionService) {
    let store = Arc::new(CountingStore::with_grants(grants));
    let service = PermissionService::new(store.clone());
    (store, service)
}

// ============================================================================
// Freshness
// ============================================================================

#[tokio::test]
async fn test_grant_visible_after_warm_cache() {
    let (_, service) = service_with(vec![]);

    assert!(!service.has_permission(Role::User, Permission::ReadUser).await.unwrap());
    assert!(service.cache().cached(Role::User).is_some());

    service.grant(Role::User, Permission::ReadUser).await.unwrap();

    assert!(service.has_permission(Role::User, Permission::ReadUser).await.unwrap());
}

#[tokio::test]
async fn test_revoke_visible_after_warm_cache() {
    let (_, service) = service_with(vec![(Role::Admin, Permission::DeleteUser)]);

    assert!(service.has_permission(Role::Admin, Permission::DeleteUser).await.unwrap());

    service.revoke(Role::Admin, Permission::DeleteUser).await.unwrap();

    assert!(!service.has_permission(Role::Admin, Permission::DeleteUser).await.unwrap());
}

#[tokio::test]
async fn test_mutation_leaves_other_role_cached() {
    let (_, service) = service_with(vec![(Role::User, Permission::ReadSelf)]);

    service.get(Role::User).await.unwrap();
    service.get(Role::Admin).await.unwrap();

    service.grant(Role::Admin, Permission::ReadUser).await.unwrap();

    assert!(service.cache().cached(Role::Admin).is_none());
    assert!(service.cache().cached(Role::User).is_some());
}

#[tokio::test]
async fn test_revoke_scenario_on_admin() {
    let (_, service) = service_with(vec![
        (Role::Admin, Permission::CreateUser),
        (Role::Admin, Permission::ReadUser),
    ]);

    assert!(service.has_permission(Role::Admin, Permission::CreateUser).await.unwrap());

    service.revoke(Role::Admin, Permission::CreateUser).await.unwrap();

    assert!(!service.has_permission(Role::Admin, Permission::CreateUser).await.unwrap());
    assert!(service.has_permission(Role::Admin, Permission::ReadUser).await.unwrap());
    assert_eq!(
        service.list_permissions(Role::Admin).await.unwrap(),
        vec![Permission::ReadUser]
    );
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_grant_twice_keeps_one_record() {
    let (store, service) = service_with(vec![]);

    service.grant(Role::User, Permission::UpdateSelf).await.unwrap();
    service.grant(Role::User, Permission::UpdateSelf).await.unwrap();

    let records = service.list_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].role, Role::User);
    assert_eq!(records[0].permission, Permission::UpdateSelf);
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn test_revoke_missing_pair_succeeds() {
    let (_, service) = service_with(vec![]);

    service.revoke(Role::User, Permission::DeleteUser).await.unwrap();

    assert!(service.list_permissions(Role::User).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_role_without_grants_is_denied() {
    let (_, service) = service_with(vec![(Role::Admin, Permission::ReadUser)]);

    for permission in Permission::all() {
        assert!(!service.has_permission(Role::User, permission).await.unwrap());
    }
    assert!(matches!(
        service.check(Role::User, Permission::ReadUser).await,
        PolicyDecision::Deny(_)
    ));
}

// ============================================================================
// Cache behavior
// ============================================================================

#[tokio::test]
async fn test_second_read_served_from_cache() {
    let (store, service) = service_with(vec![(Role::User, Permission::ReadSelf)]);

    assert!(service.has_permission(Role::User, Permission::ReadSelf).await.unwrap());
    assert!(!service.has_permission(Role::User, Permission::ReadUser).await.unwrap());
    assert!(service.is_allowed(Role::User, Permission::ReadSelf).await);

    assert_eq!(store.reads(), 1);
}

#[tokio::test]
async fn test_invalidate_forces_reload() {
    let (store, service) = service_with(vec![]);

    service.get(Role::User).await.unwrap();
    service.invalidate(Role::User).await;
    service.get(Role::User).await.unwrap();

    assert_eq!(store.reads(), 2);
}

#[tokio::test]
async fn test_clear_cache_drops_every_role() {
    let (_, service) = service_with(vec![]);

    service.get(Role::User).await.unwrap();
    service.get(Role::Admin).await.unwrap();
    assert_eq!(service.cache().len(), 2);

    service.clear_cache();
    assert!(service.cache().is_empty());
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_failing_store_never_allows() {
    let (store, service) = service_with(vec![(Role::Admin, Permission::ReadUser)]);
    store.set_failing(true);

    let err = service
        .has_permission(Role::Admin, Permission::ReadUser)
        .await
        .unwrap_err();
    assert!(err.is_store_unavailable());

    assert!(!service.is_allowed(Role::Admin, Permission::ReadUser).await);
    assert_eq!(
        service.check(Role::Admin, Permission::ReadUser).await,
        PolicyDecision::Deny("Permission data unavailable".to_string())
    );
}

#[tokio::test]
async fn test_failed_read_is_not_cached() {
    let (store, service) = service_with(vec![(Role::Admin, Permission::ReadUser)]);
    store.set_failing(true);

    assert!(service.get(Role::Admin).await.is_err());
    assert!(service.cache().cached(Role::Admin).is_none());

    store.set_failing(false);
    assert!(service.has_permission(Role::Admin, Permission::ReadUser).await.unwrap());
}

#[tokio::test]
async fn test_failed_grant_still_evicts() {
    let (store, service) = service_with(vec![]);
    service.get(Role::User).await.unwrap();

    store.set_failing(true);
    let err = service.grant(Role::User, Permission::ReadUser).await.unwrap_err();
    assert!(err.is_store_unavailable());

    assert!(service.cache().cached(Role::User).is_none());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_grant_with_readers() {
    let store = Arc::new(CountingStore::default());
    let service = Arc::new(PermissionService::new(store.clone()));

    let mut readers = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                service
                    .has_permission(Role::User, Permission::ReadUser)
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }

    service.grant(Role::User, Permission::ReadUser).await.unwrap();

    for reader in readers {
        reader.await.unwrap();
    }

    // Once the grant has returned, no reader may see the old set.
    assert!(service.has_permission(Role::User, Permission::ReadUser).await.unwrap());
}

/// Memory store whose first read pauses after taking its snapshot until released.
struct GatedStore {
    inner: MemoryPermissionStore,
    gate_armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: MemoryPermissionStore::new(),
            gate_armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl PermissionStore for GatedStore {
    async fn list_permissions(&self, role: Role) -> RbacResult<HashSet<Permission>> {
        let snapshot = self.inner.list_permissions(role).await?;
        if self.gate_armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(snapshot)
    }

    async fn grant(&self, role: Role, permission: Permission) -> RbacResult<()> {
        self.inner.grant(role, permission).await
    }

    async fn revoke(&self, role: Role, permission: Permission) -> RbacResult<()> {
        self.inner.revoke(role, permission).await
    }

    async fn list_all(&self) -> RbacResult<Vec<RolePermission>> {
        self.inner.list_all().await
    }

    fn backend_name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_grant_waits_for_in_flight_fill() {
    let store = Arc::new(GatedStore::new());
    let service = Arc::new(PermissionService::new(store.clone()));

    // Reader misses and holds a snapshot taken before the grant.
    let reader = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .has_permission(Role::User, Permission::ReadUser)
                .await
                .unwrap()
        })
    };
    store.entered.notified().await;

    let grant = {
        let service = service.clone();
        tokio::spawn(async move { service.grant(Role::User, Permission::ReadUser).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!grant.is_finished(), "grant must wait for the role's fill to complete");

    store.release.notify_one();
    assert!(!reader.await.unwrap());
    grant.await.unwrap().unwrap();

    // The stale snapshot cached by the reader was evicted by the grant.
    assert!(service.has_permission(Role::User, Permission::ReadUser).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_share_one_read() {
    let store = Arc::new(CountingStore::with_grants(vec![(Role::Admin, Permission::ReadUser)]));
    let service = Arc::new(PermissionService::new(store.clone()));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .has_permission(Role::Admin, Permission::ReadUser)
                    .await
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(store.reads(), 1);
}
