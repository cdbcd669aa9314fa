//! RBAC data models: Role, Permission and the durable grant record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::RbacError;

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// The closed set of roles a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Every role, in declaration order.
    pub const fn all() -> [Role; 2] {
        [Role::Admin, Role::User]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RbacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(RbacError::InvalidRole(other.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// The closed set of permissions that can be granted to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    UpdateSelf,
    ReadSelf,
    ManageRoles,
    ManagePermissions,
}

impl Permission {
    /// Every permission, in declaration order.
    pub const fn all() -> [Permission; 8] {
        [
            Permission::CreateUser,
            Permission::ReadUser,
            Permission::UpdateUser,
            Permission::DeleteUser,
            Permission::UpdateSelf,
            Permission::ReadSelf,
            Permission::ManageRoles,
            Permission::ManagePermissions,
        ]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateUser => "create_user",
            Self::ReadUser => "read_user",
            Self::UpdateUser => "update_user",
            Self::DeleteUser => "delete_user",
            Self::UpdateSelf => "update_self",
            Self::ReadSelf => "read_self",
            Self::ManageRoles => "manage_roles",
            Self::ManagePermissions => "manage_permissions",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = RbacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::all()
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| RbacError::InvalidPermission(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Grant record
// ═══════════════════════════════════════════════════════════════════════════════

/// A durable `(role, permission)` grant.
///
/// Created by a grant, deleted by a revoke. Never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub id: Uuid,
    pub role: Role,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RolePermission {
    pub fn new(role: Role, permission: Permission) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            role,
            permission,
            created_at: now,
            updated_at: now,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
