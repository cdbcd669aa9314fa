//! Request middleware for Warden Core.
//!
//! Permission enforcement lives next to the policy in [`crate::rbac::middleware`].

pub mod auth;

pub use auth::{AuthContext, AuthError, AuthLayer, AuthService, Authenticator, Claims};
