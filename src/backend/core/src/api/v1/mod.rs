//! V1 API module for Warden.
//!
//! This module contains the V1 endpoints for:
//! - Registration, login and the current user
//! - User management
//! - Role permission management

pub mod routes;

pub use routes::{v1_router, V1_PREFIX};
