//! Axum authorization middleware that enforces a permission on each request.
//!
//! This middleware reads the `AuthContext` (injected by the auth middleware)
//! and asks the [`PermissionService`] whether the caller's role holds the
//! required permission. Decisions are never cached here.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;
use uuid::Uuid;

use super::models::{Permission, Role};
use super::policy::{PolicyDecision, PermissionService};
use crate::error::WardenError;
use crate::middleware::auth::AuthContext;

// ═══════════════════════════════════════════════════════════════════════════════
// RBAC Context (extracted in handlers)
// ═══════════════════════════════════════════════════════════════════════════════

/// Authorization outcome recorded for downstream handlers.
#[derive(Debug, Clone)]
pub struct RbacContext {
    /// The authenticated user id.
    pub user_id: Uuid,
    /// The role the decision was made for.
    pub role: Role,
    /// The permission that was checked.
    pub checked_permission: Permission,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RbacContext
where
    S: Send + Sync,
{
    type Rejection = WardenError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RbacContext>()
            .cloned()
            .ok_or_else(|| {
                WardenError::internal("RbacContext requested on a route without RequirePermissionLayer")
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that wraps services with permission enforcement.
///
/// Must run after `AuthLayer`; requests without an `AuthContext` get a 401.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/users", get(list_users))
///     .layer(RequirePermissionLayer::new(permissions.clone(), Permission::ReadUser))
///     .layer(AuthLayer::new(authenticator, users));
/// ```
#[derive(Clone)]
pub struct RequirePermissionLayer {
    service: Arc<PermissionService>,
    permission: Permission,
}

impl RequirePermissionLayer {
    pub fn new(service: Arc<PermissionService>, permission: Permission) -> Self {
        Self { service, permission }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService {
            inner,
            service: self.service.clone(),
            permission: self.permission,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service that enforces a required permission per request.
#[derive(Clone)]
pub struct RequirePermissionService<S> {
    inner: S,
    service: Arc<PermissionService>,
    permission: Permission,
}

impl<S> Service<Request<Body>> for RequirePermissionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let service = self.service.clone();
        let permission = self.permission;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let auth_ctx = match request.extensions().get::<AuthContext>().cloned() {
                Some(ctx) => ctx,
                None => {
                    return Ok(WardenError::unauthorized("Authentication required").into_response());
                }
            };

            if let PolicyDecision::Deny(reason) = service.check(auth_ctx.role, permission).await {
                warn!(
                    user_id = %auth_ctx.user_id,
                    role = %auth_ctx.role,
                    permission = %permission,
                    reason = %reason,
                    "Permission denied"
                );
                return Ok(WardenError::forbidden(format!(
                    "You do not have permission: {}",
                    permission
                ))
                .into_response());
            }

            request.extensions_mut().insert(RbacContext {
                user_id: auth_ctx.user_id,
                role: auth_ctx.role,
                checked_permission: permission,
            });

            inner.call(request).await
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::error::{RbacError, RbacResult};
    use crate::rbac::models::RolePermission;
    use crate::rbac::store::{MemoryPermissionStore, PermissionStore};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use axum::{http::StatusCode, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn router(permission: Permission) -> Router {
        let service = Arc::new(PermissionService::new(Arc::new(
            MemoryPermissionStore::with_default_grants(),
        )));
        Router::new()
            .route(
                "/",
                get(|ctx: RbacContext| async move { ctx.checked_permission.to_string() }),
            )
            .layer(RequirePermissionLayer::new(service, permission))
    }

    fn context(role: Role) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_missing_auth_context_is_unauthorized() {
        let response = router(Permission::ReadUser)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_denied_role_is_forbidden() {
        let app = router(Permission::ReadUser).layer(Extension(context(Role::User)));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_allowed_role_reaches_handler() {
        let app = router(Permission::ReadUser).layer(Extension(context(Role::Admin)));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    struct UnavailableStore;

    #[async_trait::async_trait]
    impl PermissionStore for UnavailableStore {
        async fn list_permissions(&self, _role: Role) -> RbacResult<HashSet<Permission>> {
            Err(RbacError::store_unavailable("unavailable", "connection refused"))
        }

        async fn grant(&self, _role: Role, _permission: Permission) -> RbacResult<()> {
            Err(RbacError::store_unavailable("unavailable", "connection refused"))
        }

        async fn revoke(&self, _role: Role, _permission: Permission) -> RbacResult<()> {
            Err(RbacError::store_unavailable("unavailable", "connection refused"))
        }

        async fn list_all(&self) -> RbacResult<Vec<RolePermission>> {
            Err(RbacError::store_unavailable("unavailable", "connection refused"))
        }

        fn backend_name(&self) -> &'static str {
            "unavailable"
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_forbidden_without_running_handler() {
        let service = Arc::new(PermissionService::new(Arc::new(UnavailableStore)));
        let handler_ran = Arc::new(AtomicBool::new(false));
        let flag = handler_ran.clone();

        // Admin holds read_user by default; only the store failure denies it here.
        let app = Router::new()
            .route(
                "/",
                get(move || async move {
                    flag.store(true, Ordering::SeqCst);
                    "reached"
                }),
            )
            .layer(RequirePermissionLayer::new(service, Permission::ReadUser))
            .layer(Extension(context(Role::Admin)));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!handler_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_layer_keeps_permission() {
        let service = Arc::new(PermissionService::new(Arc::new(MemoryPermissionStore::new())));
        let layer = RequirePermissionLayer::new(service, Permission::ManageRoles);
        assert_eq!(layer.permission(), Permission::ManageRoles);
    }
}
