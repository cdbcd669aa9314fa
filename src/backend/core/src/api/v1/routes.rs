//! V1 API routes for Warden.
//!
//! This module defines all V1 API routes, which layers guard them, and their
//! handlers.

use axum::{
    handler::Handler,
    routing::{get, post},
    Router,
};

use crate::api::{handlers, AppState};
use crate::middleware::auth::AuthLayer;
use crate::rbac::{Permission, RequirePermissionLayer};

/// V1 API prefix.
pub const V1_PREFIX: &str = "/api/v1";

/// Build the V1 API router.
///
/// All routes are mounted under `/api/v1/`.
///
/// # Endpoints
///
/// ## Auth
/// - `POST /auth/register` - Register and receive a token (public)
/// - `POST /auth/login` - Exchange credentials for a token (public)
/// - `GET /auth/me` - Current user
///
/// ## Users
/// - `GET /users` - List users (`read_user`)
/// - `POST /users` - Create a user (`create_user`)
/// - `GET /users/:id` - Get a user (self, or `read_user`)
/// - `PUT /users/:id` - Update a user (self, or `update_user`)
/// - `DELETE /users/:id` - Delete a user (`delete_user`)
///
/// ## Permissions (`manage_permissions`)
/// - `GET /permissions` - The permission enumeration
/// - `GET /permissions/role/:role` - Permissions of a role
/// - `GET /permissions/all` - Every grant record
/// - `POST /permissions/add` - Grant a permission to a role
/// - `POST /permissions/remove` - Revoke a permission from a role
pub fn v1_router(state: &AppState) -> Router<AppState> {
    let auth = AuthLayer::new(
        state.authenticator.clone(),
        state.users.repository().clone(),
    );
    let require = |permission| RequirePermissionLayer::new(state.permissions.clone(), permission);
    let manage = require(Permission::ManagePermissions);

    let public = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login));

    let authenticated = Router::new()
        .route("/auth/me", get(handlers::current_user))
        // User endpoints
        .route(
            "/users",
            get(handlers::list_users.layer(require(Permission::ReadUser)))
                .post(handlers::create_user.layer(require(Permission::CreateUser))),
        )
        .route(
            "/users/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user.layer(require(Permission::DeleteUser))),
        )
        // Permission endpoints
        .route(
            "/permissions",
            get(handlers::list_permission_names.layer(manage.clone())),
        )
        .route(
            "/permissions/role/:role",
            get(handlers::role_permissions.layer(manage.clone())),
        )
        .route("/permissions/all", get(handlers::list_grants.layer(manage.clone())))
        .route("/permissions/add", post(handlers::grant_permission.layer(manage.clone())))
        .route("/permissions/remove", post(handlers::revoke_permission.layer(manage)))
        .route_layer(auth);

    public.merge(authenticated)
}

/// V1 API route constants for use in clients and documentation.
pub mod paths {
    // Auth routes
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const ME: &str = "/api/v1/auth/me";

    // User routes
    pub const USERS: &str = "/api/v1/users";
    pub const USER: &str = "/api/v1/users/:id";

    // Permission routes
    pub const PERMISSIONS: &str = "/api/v1/permissions";
    pub const ROLE_PERMISSIONS: &str = "/api/v1/permissions/role/:role";
    pub const ALL_GRANTS: &str = "/api/v1/permissions/all";
    pub const GRANT: &str = "/api/v1/permissions/add";
    pub const REVOKE: &str = "/api/v1/permissions/remove";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_constants() {
        for path in [paths::REGISTER, paths::USERS, paths::PERMISSIONS, paths::REVOKE] {
            assert!(path.starts_with(V1_PREFIX));
        }
    }
}
