//! Authentication commands: login, register, whoami.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};

use super::config;
use super::users::{print_user, User};
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Log in and store the issued token
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Print the token without storing it
        #[arg(long)]
        no_save: bool,
    },

    /// Register a new account (always receives the `user` role)
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the account behind the current token
    Whoami,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize, Serialize)]
struct AuthResponse {
    user: User,
    token: String,
}

pub async fn execute(cmd: AuthCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        AuthCommands::Login {
            email,
            password,
            no_save,
        } => {
            let resp: AuthResponse = client
                .post(
                    "/api/v1/auth/login",
                    &LoginRequest {
                        email: &email,
                        password: &password,
                    },
                )
                .await?;
            if !no_save {
                config::store_token(&resp.token)?;
            }
            report(&resp, !no_save, format)?;
        }

        AuthCommands::Register {
            name,
            email,
            password,
        } => {
            let resp: AuthResponse = client
                .post(
                    "/api/v1/auth/register",
                    &RegisterRequest {
                        name: &name,
                        email: &email,
                        password: &password,
                    },
                )
                .await?;
            report(&resp, false, format)?;
        }

        AuthCommands::Whoami => {
            let user: User = client.get("/api/v1/auth/me").await?;
            print_user(&user, format)?;
        }
    }

    Ok(())
}

fn report(resp: &AuthResponse, saved: bool, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_success(&format!(
                "Authenticated as {} ({})",
                resp.user.email, resp.user.role
            ));
            output::print_detail("Token", &resp.token);
            if saved {
                output::print_info("Token saved to CLI configuration");
            }
            Ok(())
        }
        _ => output::print_item(resp, format),
    }
}
