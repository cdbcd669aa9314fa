//! API request handlers with proper error propagation.
//!
//! All handlers return `Result<impl IntoResponse, WardenError>` so that errors
//! are converted to the right HTTP status and error envelope by the
//! `IntoResponse` implementation on `WardenError`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiResponse, AppState};
use crate::error::{ErrorCode, Result, WardenError};
use crate::middleware::auth::AuthContext;
use crate::rbac::{Permission, PolicyDecision, Role, RolePermission};
use crate::users::{NewUser, User, UserUpdate};

// ═══════════════════════════════════════════════════════════════════════════════
// Extraction helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| WardenError::validation(rejection.body_text()))
}

fn user_id(path: std::result::Result<Path<Uuid>, PathRejection>) -> Result<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|_| WardenError::validation("User id must be a UUID").with_context("field", "id"))
}

/// Require `permission` for the caller's role beyond what the route layer checked.
async fn require(state: &AppState, ctx: &AuthContext, permission: Permission) -> Result<()> {
    match state.permissions.check(ctx.role, permission).await {
        PolicyDecision::Allow => Ok(()),
        PolicyDecision::Deny(_) => Err(WardenError::forbidden(format!(
            "You do not have permission: {}",
            permission
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.as_ref().map(|h| h.render()).unwrap_or_default();

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Auth Handlers
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = body(payload)?;

    // Self-registration always yields the default role.
    let user = state
        .users
        .create(NewUser {
            name: req.name,
            email: req.email,
            password: req.password,
            role: None,
        })
        .await?;
    let token = state.authenticator.issue_token(&user)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AuthResponse { user, token })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = body(payload)?;
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(WardenError::validation("Email and password are required"));
    }

    let user = state
        .users
        .validate_credentials(&req.email, &req.password)
        .await?
        .ok_or_else(|| {
            WardenError::new(
                ErrorCode::InvalidCredentials,
                "Invalid email or password",
            )
        })?;
    let token = state.authenticator.issue_token(&user)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(ApiResponse::success(AuthResponse { user, token })))
}

pub async fn current_user(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<impl IntoResponse> {
    let user = state.users.get(ctx.user_id).await?;
    Ok(Json(ApiResponse::success(user)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// User Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.users.find_all().await?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse> {
    let id = user_id(path)?;
    if !ctx.is_self(id) {
        require(&state, &ctx, Permission::ReadUser).await?;
    }

    let user = state.users.get(id).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let input = body(payload)?;
    let user = state.users.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn update_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    payload: std::result::Result<Json<UserUpdate>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let id = user_id(path)?;
    let update = body(payload)?;

    if !ctx.is_self(id) {
        require(&state, &ctx, Permission::UpdateUser).await?;
    } else if update.role.is_some_and(|role| role != ctx.role) {
        require(&state, &ctx, Permission::UpdateUser)
            .await
            .map_err(|_| WardenError::forbidden("You cannot change your own role"))?;
    }

    let user = state.users.update(id, update).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse> {
    let id = user_id(path)?;
    state.users.delete(id).await?;
    Ok(Json(ApiResponse::message(format!("User {} deleted", id))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Handlers
// ═══════════════════════════════════════════════════════════════════════════════

/// Grant or revoke input. Values are validated against the enumerations
/// before the store is touched.
#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub role: String,
    pub permission: String,
}

impl PermissionRequest {
    fn parse(&self) -> Result<(Role, Permission)> {
        let role = self.role.parse::<Role>()?;
        let permission = self.permission.parse::<Permission>()?;
        Ok((role, permission))
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionList {
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
pub struct RolePermissions {
    pub role: Role,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
pub struct GrantList {
    pub role_permissions: Vec<RolePermission>,
}

pub async fn list_permission_names(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(PermissionList {
        permissions: state.permissions.all_permissions(),
    }))
}

pub async fn role_permissions(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<impl IntoResponse> {
    let role = role.parse::<Role>()?;
    let permissions = state.permissions.list_permissions(role).await?;
    Ok(Json(ApiResponse::success(RolePermissions { role, permissions })))
}

pub async fn list_grants(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let role_permissions = state.permissions.list_all().await?;
    Ok(Json(ApiResponse::success(GrantList { role_permissions })))
}

pub async fn grant_permission(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PermissionRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let (role, permission) = body(payload)?.parse()?;
    state.permissions.grant(role, permission).await?;
    Ok(Json(ApiResponse::message(format!(
        "Permission {} added to role {}",
        permission, role
    ))))
}

pub async fn revoke_permission(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PermissionRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let (role, permission) = body(payload)?.parse()?;
    state.permissions.revoke(role, permission).await?;
    Ok(Json(ApiResponse::message(format!(
        "Permission {} removed from role {}",
        permission, role
    ))))
}
