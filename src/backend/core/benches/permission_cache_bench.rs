//! Benchmarks for permission checks through the cache.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use warden_core::rbac::{MemoryPermissionStore, Permission, PermissionService, Role};

fn service() -> PermissionService {
    PermissionService::new(Arc::new(MemoryPermissionStore::with_default_grants()))
}

fn bench_has_permission_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_permission_hit");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = service();
    rt.block_on(async {
        for role in Role::all() {
            service.get(role).await.unwrap();
        }
    });

    for role in Role::all() {
        group.bench_with_input(BenchmarkId::from_parameter(role), &role, |b, &role| {
            b.to_async(&rt).iter(|| async {
                black_box(service.has_permission(role, Permission::ReadUser).await.unwrap())
            });
        });
    }
    group.finish();
}

fn bench_check_decision(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_decision");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = service();

    group.bench_function("allow", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(service.check(Role::Admin, Permission::DeleteUser).await) });
    });
    group.bench_function("deny", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(service.check(Role::User, Permission::DeleteUser).await) });
    });
    group.finish();
}

fn bench_miss_after_invalidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("miss_after_invalidate");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = service();

    group.bench_function("invalidate_then_get", |b| {
        b.to_async(&rt).iter(|| async {
            service.invalidate(Role::Admin).await;
            black_box(service.get(Role::Admin).await.unwrap())
        });
    });
    group.finish();
}

fn bench_grant_revoke_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("grant_revoke_cycle");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = service();
    group.throughput(Throughput::Elements(2));

    group.bench_function("user_read_user", |b| {
        b.to_async(&rt).iter(|| async {
            service.grant(Role::User, Permission::ReadUser).await.unwrap();
            service.revoke(Role::User, Permission::ReadUser).await.unwrap();
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_has_permission_hit,
    bench_check_decision,
    bench_miss_after_invalidate,
    bench_grant_revoke_cycle
);
criterion_main!(benches);
