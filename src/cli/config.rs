use std::path::Path;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use crate::config::{Settings, KEYS};

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Set configuration values
    Set(SetArgs),
    /// Get a configuration value, or all of them
    Get {
        /// Configuration key
        key: Option<String>,
    },
    /// List all configuration
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SetArgs {
    /// Synology NAS hostname or IP address
    #[arg(long)]
    pub host: Option<String>,
    /// Username for authentication
    #[arg(long)]
    pub username: Option<String>,
    /// Password for Web API authentication
    #[arg(long)]
    pub password: Option<String>,
    /// SSH port
    #[arg(long)]
    pub port: Option<u16>,
    /// SSH private key file path
    #[arg(long)]
    pub keyfile: Option<String>,
    /// Connection timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Web API (HTTPS) port
    #[arg(long)]
    pub api_port: Option<u16>,
}

impl SetArgs {
    /// Changed (key, value) pairs in the order they were declared.
    fn changes(&self) -> Vec<(&'static str, String)> {
        let mut changes = vec![];
        if let Some(ref host) = self.host {
            changes.push(("host", host.clone()));
        }
        if let Some(ref username) = self.username {
            changes.push(("username", username.clone()));
        }
        if let Some(ref password) = self.password {
            changes.push(("password", password.clone()));
        }
        if let Some(port) = self.port {
            changes.push(("port", port.to_string()));
        }
        if let Some(ref keyfile) = self.keyfile {
            changes.push(("keyfile", keyfile.clone()));
        }
        if let Some(timeout) = self.timeout {
            changes.push(("timeout", timeout.to_string()));
        }
        if let Some(api_port) = self.api_port {
            changes.push(("api_port", api_port.to_string()));
        }
        changes
    }

    pub fn apply(&self, settings: &mut Settings) -> Result<()> {
        let changes = self.changes();
        if changes.is_empty() {
            return Err(anyhow!("no configuration values provided"));
        }

        for (key, value) in changes {
            settings.set(key, &value)?;
            let shown = settings.get(key)?.unwrap_or_default();
            println!("✅ Set {}: {}", key, display_value(key, &shown));
        }
        Ok(())
    }
}

fn display_value<'a>(key: &str, value: &'a str) -> &'a str {
    if key == "password" {
        "[hidden]"
    } else {
        value
    }
}

impl ConfigCommand {
    /// `settings` is the effective configuration; `set` rewrites the file at
    /// `path` from its own contents so environment overrides are not persisted.
    pub fn execute(&self, path: &Path, settings: &Settings) -> Result<()> {
        match &self.action {
            ConfigAction::Set(args) => {
                let mut stored = Settings::load(path)?;
                args.apply(&mut stored)?;
                stored.save(path)?;
                println!("💾 Saved configuration to {}", path.display());
            }
            ConfigAction::Get { key: Some(key) } => match settings.get(key)? {
                Some(value) => println!("{}: {}", key, display_value(key, &value)),
                None => return Err(anyhow!("configuration key '{}' is not set", key)),
            },
            ConfigAction::Get { key: None } | ConfigAction::List => {
                println!("⚙️  Current configuration:");
                for key in KEYS {
                    if let Some(value) = settings.get(key)? {
                        println!("  {}: {}", key, display_value(key, &value));
                    }
                }
            }
        }
        Ok(())
    }
}
