//! Bearer-token authentication.
//!
//! Features:
//! - HS256 JWT issuing and validation
//! - Distinct rejections for missing, invalid and expired tokens
//! - Current-user lookup so that deleted users and role changes take effect
//!   immediately
//! - Request context injection
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::middleware::auth::{AuthLayer, Authenticator};
//!
//! let authenticator = Arc::new(Authenticator::new(&config.auth));
//!
//! let app = Router::new()
//!     .route("/api/v1/auth/me", get(me))
//!     .layer(AuthLayer::new(authenticator, users));
//! ```

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use futures::future::BoxFuture;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{ErrorCode, WardenError};
use crate::rbac::Role;
use crate::users::{User, UserRepository};

// ═══════════════════════════════════════════════════════════════════════════════
// Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication credentials")]
    MissingCredentials,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token subject no longer exists")]
    UnknownUser,

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::UnknownUser => "unknown_user",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<AuthError> for WardenError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredentials => {
                WardenError::new(ErrorCode::Unauthorized, "Authentication credentials are required")
            }
            AuthError::InvalidToken => {
                WardenError::new(ErrorCode::InvalidToken, "The provided token is invalid")
            }
            AuthError::TokenExpired => {
                WardenError::new(ErrorCode::TokenExpired, "The authentication token has expired")
            }
            AuthError::UnknownUser => WardenError::new(
                ErrorCode::Unauthorized,
                "The account for this token no longer exists",
            ),
            AuthError::Internal(message) => WardenError::internal(message),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        counter!("warden_auth_failures_total", "reason" => self.reason()).increment(1);
        WardenError::from(self).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JWT Claims
// ═══════════════════════════════════════════════════════════════════════════════

/// JWT token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// User email at issue time
    pub email: String,

    /// User role at issue time
    pub role: Role,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// Claims for `user`, valid for `ttl` from now.
    pub fn for_user(user: &User, ttl: Duration, issuer: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Auth Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication context attached to requests.
///
/// Built from the current user record, not from the token, so that the role
/// used for authorization is always the stored one.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID
    pub user_id: Uuid,

    /// User email
    pub email: String,

    /// Current role
    pub role: Role,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }

    pub fn is_self(&self, id: Uuid) -> bool {
        self.user_id == id
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authenticator
// ═══════════════════════════════════════════════════════════════════════════════

/// Issues and validates tokens.
pub struct Authenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    issuer: Option<String>,
}

impl Authenticator {
    /// Create a new authenticator.
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway.as_secs();
        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            token_ttl: Duration::from_std(config.token_ttl).unwrap_or_else(|_| Duration::hours(24)),
            issuer: config.issuer.clone(),
        }
    }

    /// Lifetime of issued tokens.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Issue a token for `user`.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let claims = Claims::for_user(user, self.token_ttl, self.issuer.clone());
        self.encode(&claims)
    }

    /// Sign arbitrary claims.
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("JWT validation failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })
    }

    /// Validate the bearer token carried by `headers`.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = extract_bearer(headers).ok_or(AuthError::MissingCredentials)?;
        self.verify(token)
    }
}

/// The token of an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer for Tower.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<Authenticator>,
    users: Arc<dyn UserRepository>,
}

impl AuthLayer {
    /// Create a new auth layer.
    pub fn new(authenticator: Arc<Authenticator>, users: Arc<dyn UserRepository>) -> Self {
        Self { authenticator, users }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authenticator: self.authenticator.clone(),
            users: self.users.clone(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
    users: Arc<dyn UserRepository>,
}

impl<S> Service<Request<Body>> for AuthService<S>
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
        let authenticator = self.authenticator.clone();
        let users = self.users.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let claims = match authenticator.authenticate(request.headers()) {
                Ok(claims) => claims,
                Err(e) => return Ok(e.into_response()),
            };

            let Some(user_id) = claims.user_id() else {
                return Ok(AuthError::InvalidToken.into_response());
            };

            let user = match users.find_by_id(user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => return Ok(AuthError::UnknownUser.into_response()),
                Err(e) => return Ok(e.into_response()),
            };

            request.extensions_mut().insert(AuthContext::from_user(&user));
            inner.call(request).await
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Extractor
// ═══════════════════════════════════════════════════════════════════════════════

/// Extractor for authentication context in handlers.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
