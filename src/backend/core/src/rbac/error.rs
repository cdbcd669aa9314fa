//! Errors raised by the permission store, cache and decision procedure.

use thiserror::Error;

/// Result alias for RBAC operations.
pub type RbacResult<T> = std::result::Result<T, RbacError>;

/// Failures of the access-control subsystem.
///
/// An empty permission set is never an error; `StoreUnavailable` always means
/// the backing store could not answer.
#[derive(Debug, Clone, Error)]
pub enum RbacError {
    #[error("Permission store unavailable ({backend}): {reason}")]
    StoreUnavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),
}

impl RbacError {
    pub fn store_unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}
