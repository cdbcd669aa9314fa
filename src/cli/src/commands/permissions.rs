//! Permission administration commands.
//!
//! Every command requires the `manage_permissions` permission on the server.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum PermissionCommands {
    /// List every permission name
    List,

    /// Show the permissions held by a role
    Role {
        /// Role name (admin or user)
        role: String,
    },

    /// List every role/permission grant
    All,

    /// Grant a permission to a role
    Grant {
        /// Role name
        role: String,
        /// Permission name
        permission: String,
    },

    /// Revoke a permission from a role
    Revoke {
        /// Role name
        role: String,
        /// Permission name
        permission: String,
    },
}

// ── API response types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct PermissionList {
    permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RolePermissions {
    role: String,
    permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GrantList {
    role_permissions: Vec<Grant>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Grant {
    role: String,
    permission: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Tabled)]
struct GrantRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Permission")]
    permission: String,
    #[tabled(rename = "Granted")]
    granted: String,
}

#[derive(Debug, Serialize, Tabled)]
struct NameRow {
    #[tabled(rename = "Permission")]
    permission: String,
}

#[derive(Serialize)]
struct PermissionRequest {
    role: String,
    permission: String,
}

fn name_rows(permissions: Vec<String>) -> Vec<NameRow> {
    permissions
        .into_iter()
        .map(|permission| NameRow { permission })
        .collect()
}

// ── Execution ───────────────────────────────────────────────────────────────

pub async fn execute(
    cmd: PermissionCommands,
    client: &ApiClient,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        PermissionCommands::List => {
            let list: PermissionList = client.get("/api/v1/permissions").await?;
            match format {
                OutputFormat::Table => output::print_list(&name_rows(list.permissions), format)?,
                _ => output::print_item(&list, format)?,
            }
        }

        PermissionCommands::Role { role } => {
            let resp: RolePermissions = client
                .get(&format!("/api/v1/permissions/role/{}", role))
                .await?;
            match format {
                OutputFormat::Table => {
                    output::print_header(&format!("Role: {}", resp.role));
                    output::print_list(&name_rows(resp.permissions), format)?;
                }
                _ => output::print_item(&resp, format)?,
            }
        }

        PermissionCommands::All => {
            let resp: GrantList = client.get("/api/v1/permissions/all").await?;
            match format {
                OutputFormat::Table => {
                    let rows: Vec<GrantRow> = resp
                        .role_permissions
                        .into_iter()
                        .map(|g| GrantRow {
                            role: g.role,
                            permission: g.permission,
                            granted: g.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        })
                        .collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&resp, format)?,
            }
        }

        PermissionCommands::Grant { role, permission } => {
            let message = client
                .post_for_message("/api/v1/permissions/add", &PermissionRequest { role, permission })
                .await?;
            output::print_message(&message, format)?;
        }

        PermissionCommands::Revoke { role, permission } => {
            let message = client
                .post_for_message(
                    "/api/v1/permissions/remove",
                    &PermissionRequest { role, permission },
                )
                .await?;
            output::print_message(&message, format)?;
        }
    }

    Ok(())
}
