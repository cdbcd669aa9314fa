#![allow(clippy::result_large_err)]
//! # Warden Core
//!
//! User registration, login and role-based permission management over HTTP.
//!
//! ## Architecture
//!
//! - **RBAC**: closed role and permission enums, a durable permission store,
//!   a per-role permission cache and the authorization decision procedure
//! - **Users**: accounts with Argon2 password hashes
//! - **Middleware**: JWT authentication and per-route permission enforcement
//! - **API**: Axum REST endpoints under `/api/v1`
//! - **Observability**: structured logging, optional OTLP export, Prometheus metrics

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod rbac;
pub mod users;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, Result, WardenError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, ApiResponse, AppState};
    pub use crate::config::{AuthConfig, Config};
    pub use crate::error::{ErrorCode, ErrorDetails, ErrorSeverity, Result, WardenError};
    pub use crate::middleware::{AuthContext, AuthError, AuthLayer, Authenticator, Claims};
    pub use crate::rbac::{
        MemoryPermissionStore, Permission, PermissionCache, PermissionService, PermissionStore,
        PgPermissionStore, PolicyDecision, RbacContext, RbacError, RbacResult,
        RequirePermissionLayer, Role, RolePermission,
    };
    pub use crate::users::{
        MemoryUserRepository, NewUser, PgUserRepository, User, UserRepository, UserService,
        UserUpdate,
    };
}
