//! Configuration management commands.
//!
//! Stores CLI configuration in `~/.warden/config.toml`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::output::{self, OutputFormat};

/// Key holding the API base URL.
pub const API_URL_KEY: &str = "api-url";

/// Key holding the bearer token saved by `auth login`.
pub const TOKEN_KEY: &str = "token";

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        /// Configuration key (api-url or token)
        key: String,
        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show all configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Persistent CLI configuration stored on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl CliConfig {
    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Values safe to print: the token is masked.
    fn displayed(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| {
                let shown = if k == TOKEN_KEY { mask(v) } else { v.clone() };
                (k.clone(), shown)
            })
            .collect()
    }
}

fn mask(token: &str) -> String {
    let tail: String = token.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{}", tail)
}

/// Return the path to the configuration file (`~/.warden/config.toml`).
fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".warden").join("config.toml"))
}

fn load_config() -> Result<CliConfig> {
    CliConfig::load_from(&config_path()?)
}

fn save_config(cfg: &CliConfig) -> Result<()> {
    cfg.save_to(&config_path()?)
}

/// Load a value from the config file, if set.
pub fn load_value(key: &str) -> Option<String> {
    load_config().ok().and_then(|cfg| cfg.values.get(key).cloned())
}

/// Persist a bearer token for later commands.
pub fn store_token(token: &str) -> Result<()> {
    let mut cfg = load_config()?;
    cfg.values.insert(TOKEN_KEY.to_string(), token.to_string());
    save_config(&cfg)
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Set { key, value } => {
            let mut cfg = load_config()?;
            cfg.values.insert(key.clone(), value);
            save_config(&cfg)?;

            let shown = cfg.displayed().remove(&key).unwrap_or_default();
            match format {
                OutputFormat::Table => output::print_success(&format!("{} = {}", key, shown)),
                _ => output::print_item(&serde_json::json!({ "key": key, "value": shown }), format)?,
            }
        }

        ConfigCommands::Get { key } => {
            let cfg = load_config()?;
            match cfg.values.get(&key) {
                Some(value) => match format {
                    OutputFormat::Table => println!("{}", value),
                    _ => output::print_item(
                        &serde_json::json!({ "key": key, "value": value }),
                        format,
                    )?,
                },
                None => anyhow::bail!("Key '{}' not found", key),
            }
        }

        ConfigCommands::Show => {
            let cfg = load_config()?;

            if cfg.values.is_empty() {
                output::print_info("No configuration values set.");
                return Ok(());
            }

            let values = cfg.displayed();
            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    for (k, v) in &values {
                        output::print_detail(k, v);
                    }
                }
                _ => output::print_item(&values, format)?,
            }
        }

        ConfigCommands::Reset { force } => {
            if !force {
                output::print_info("This will reset all CLI configuration. Use --force to confirm.");
                return Ok(());
            }

            let path = config_path()?;
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }

            output::print_success("Configuration reset to defaults");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CliConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(cfg.values.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = CliConfig::default();
        cfg.values.insert(API_URL_KEY.to_string(), "http://warden:8080".to_string());
        cfg.save_to(&path).unwrap();

        let loaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(loaded.values.get(API_URL_KEY).unwrap(), "http://warden:8080");
    }

    #[test]
    fn test_token_is_masked_when_displayed() {
        let mut cfg = CliConfig::default();
        cfg.values.insert(TOKEN_KEY.to_string(), "eyJhbGciOi.abc.wxyz".to_string());
        cfg.values.insert(API_URL_KEY.to_string(), "http://localhost:8080".to_string());

        let shown = cfg.displayed();
        assert_eq!(shown[TOKEN_KEY], "****wxyz");
        assert_eq!(shown[API_URL_KEY], "http://localhost:8080");
    }
}
