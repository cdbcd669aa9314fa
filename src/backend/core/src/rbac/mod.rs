//! Role-Based Access Control (RBAC).
//!
//! This module provides:
//! - **Models**: the closed `Role` and `Permission` enumerations and grant records
//! - **Store**: durable role -> permission grants (PostgreSQL or in-memory)
//! - **Cache**: per-role memoization of store reads, evicted on mutation
//! - **Policy**: the authorization decision procedure and grant administration
//! - **Middleware**: a Tower layer enforcing one permission per route
//!
//! # Usage
//!
//! ```rust,ignore
//! use warden_core::rbac::{MemoryPermissionStore, Permission, PermissionService, Role};
//!
//! let service = Arc::new(PermissionService::new(Arc::new(
//!     MemoryPermissionStore::with_default_grants(),
//! )));
//!
//! assert!(service.has_permission(Role::Admin, Permission::DeleteUser).await?);
//!
//! let app = Router::new()
//!     .route("/users", get(list_users))
//!     .layer(RequirePermissionLayer::new(service.clone(), Permission::ReadUser));
//! ```

pub mod cache;
pub mod error;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod roles;
pub mod store;

pub use cache::{PermissionCache, PermissionSet, RoleGuard};
pub use error::{RbacError, RbacResult};
pub use middleware::{RbacContext, RequirePermissionLayer, RequirePermissionService};
pub use models::{Permission, Role, RolePermission};
pub use policy::{PermissionService, PolicyDecision};
pub use store::{MemoryPermissionStore, PermissionStore, PgPermissionStore};
