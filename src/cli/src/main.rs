//! Warden CLI - Command-line interface for administering a Warden server.
//!
//! Provides commands for authentication, users, permissions, health, and
//! local configuration.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{auth, config, health, permissions, users};
use output::OutputFormat;

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Warden - user and permission administration CLI
#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Warden - user and role-based permission administration",
    long_about = "CLI tool for managing Warden users, role permissions, and CLI configuration.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "WARDEN_API_URL")]
    api_url: Option<String>,

    /// Bearer token (defaults to the one saved by `auth login`)
    #[arg(long, global = true, env = "WARDEN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Login, registration, and current account
    #[command(subcommand)]
    Auth(auth::AuthCommands),

    /// User management operations
    #[command(subcommand)]
    Users(users::UserCommands),

    /// Role permission administration
    #[command(subcommand)]
    Permissions(permissions::PermissionCommands),

    /// Check server health
    Health,

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(|| config::load_value(config::API_URL_KEY))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let token = cli
        .token
        .clone()
        .or_else(|| config::load_value(config::TOKEN_KEY));

    let client = client::ApiClient::new(&api_url, token)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Auth(cmd) => auth::execute(cmd, &client, format).await,
        Commands::Users(cmd) => users::execute(cmd, &client, format).await,
        Commands::Permissions(cmd) => permissions::execute(cmd, &client, format).await,
        Commands::Health => health::execute(&client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_permission_grant() {
        let cli = Cli::try_parse_from([
            "warden",
            "--output",
            "json",
            "permissions",
            "grant",
            "user",
            "read_user",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Permissions(permissions::PermissionCommands::Grant { .. })
        ));
    }
}
