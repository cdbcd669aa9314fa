//! HTTP API layer for Warden.
//!
//! - `GET /health` and `GET /metrics` are public and unversioned
//! - Everything else lives under `/api/v1/` (see [`v1::routes`])
//! - Unknown paths answer with a JSON 404
//!
//! Successful responses use the [`ApiResponse`] envelope; failures use the
//! error envelope produced by `WardenError`.

mod handlers;
pub mod v1;

use axum::{http::Uri, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::WardenError;
use crate::middleware::auth::Authenticator;
use crate::rbac::PermissionService;
use crate::users::{UserRepository, UserService};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub permissions: Arc<PermissionService>,
    pub authenticator: Arc<Authenticator>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        permissions: Arc<PermissionService>,
        authenticator: Arc<Authenticator>,
    ) -> Self {
        Self {
            users: UserService::new(users),
            permissions,
            authenticator,
            metrics: None,
        }
    }

    /// Serve `/metrics` from this recorder handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Build the API router.
///
/// # Example
///
/// ```rust,ignore
/// let state = AppState::new(users, permissions, authenticator);
/// let app = build_router(state);
/// ```
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest(v1::V1_PREFIX, v1::v1_router(&state))
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> WardenError {
    WardenError::route_not_found(uri.path())
}

/// API response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, Some("test data"));
        assert!(response.message.is_none());
    }

    #[test]
    fn test_api_response_message_omits_data() {
        let json = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "message": "done"}));
    }
}
