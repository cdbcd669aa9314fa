//! User management commands.
//!
//! Provides list, get, create, and delete operations for user accounts.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all users (requires read_user)
    List,

    /// Show a single user
    Get {
        /// User ID
        user_id: Uuid,
    },

    /// Create a user (requires create_user)
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Initial password
        #[arg(short, long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Role to assign (admin or user)
        #[arg(short, long)]
        role: Option<String>,
    },

    /// Delete a user (requires delete_user)
    Delete {
        /// User ID
        user_id: Uuid,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

// ── API response types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<User> for UserRow {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
            role: user.role,
            created: user.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[derive(Serialize)]
struct CreateRequest {
    name: String,
    email: String,
    password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

/// Print one user as details (table) or serialized.
pub fn print_user(user: &User, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_header(&format!("User: {}", user.name));
            output::print_detail("ID", &user.id.to_string());
            output::print_detail("Email", &user.email);
            output::print_detail("Role", &user.role);
            output::print_detail("Created", &user.created_at.to_rfc3339());
            output::print_detail("Updated", &user.updated_at.to_rfc3339());
            Ok(())
        }
        _ => output::print_item(user, format),
    }
}

// ── Execution ───────────────────────────────────────────────────────────────

pub async fn execute(cmd: UserCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        UserCommands::List => {
            let users: Vec<User> = client.get("/api/v1/users").await?;
            match format {
                OutputFormat::Table => {
                    let rows: Vec<UserRow> = users.into_iter().map(UserRow::from).collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&users, format)?,
            }
        }

        UserCommands::Get { user_id } => {
            let user: User = client.get(&format!("/api/v1/users/{}", user_id)).await?;
            print_user(&user, format)?;
        }

        UserCommands::Create {
            name,
            email,
            password,
            role,
        } => {
            let user: User = client
                .post(
                    "/api/v1/users",
                    &CreateRequest {
                        name,
                        email,
                        password,
                        role,
                    },
                )
                .await?;
            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("User {} created with role {}", user.id, user.role))
                }
                _ => output::print_item(&user, format)?,
            }
        }

        UserCommands::Delete { user_id, force } => {
            if !force {
                output::print_info("This will delete the user. Use --force to skip confirmation.");
                return Ok(());
            }

            let message = client.delete(&format!("/api/v1/users/{}", user_id)).await?;
            output::print_message(&message, format)?;
        }
    }

    Ok(())
}
