/// Configuration serialization and deserialization.
use std::{
    fs::{self},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::expand_tilde;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_API_PORT: u16 = 5001;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Keys accepted by `config get` / `config set`, in display order.
pub const KEYS: [&str; 7] = [
    "host", "username", "password", "port", "keyfile", "timeout", "api_port",
];

const ENV_PREFIX: &str = "SYNO_VM_";

// config like:
// host = "nas.local"
// username = "admin"
// password = "secret"
// port = 22
// keyfile = "~/.ssh/id_ed25519"
// timeout = 30
// api_port = 5001
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub host: Option<String>,
    pub username: Option<String>,
    // only used by the Web API client
    pub password: Option<String>,
    pub port: u16,
    pub keyfile: Option<String>,
    pub timeout: u64,
    pub api_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            password: None,
            port: DEFAULT_SSH_PORT,
            keyfile: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            api_port: DEFAULT_API_PORT,
        }
    }
}

/// Default location of the config file, `~/.syno-vm/config.toml`.
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Configuration("cannot determine home directory".into()))?;
    Ok(home.join(".syno-vm").join("config.toml"))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let settings = if is_yaml(path) {
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?
        } else {
            toml::from_str(&contents)
                .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?
        };

        Ok(settings)
    }

    /// Load settings and apply `SYNO_VM_*` environment overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut settings = Self::load(path)?;
        settings.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())?;
        Ok(settings)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in KEYS {
            if let Some(value) = lookup(&key.to_uppercase()) {
                log::debug!("Config key '{}' overridden from environment", key);
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let contents = if is_yaml(path) {
            serde_yaml::to_string(self).map_err(|e| Error::Configuration(e.to_string()))?
        } else {
            toml::to_string_pretty(self).map_err(|e| Error::Configuration(e.to_string()))?
        };
        fs::write(path, contents)?;

        Ok(())
    }

    /// Current value of `key`, or `None` when it is unset.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = match key {
            "host" => self.host.clone(),
            "username" => self.username.clone(),
            "password" => self.password.clone(),
            "port" => Some(self.port.to_string()),
            "keyfile" => self.keyfile.clone(),
            "timeout" => Some(self.timeout.to_string()),
            "api_port" => Some(self.api_port.to_string()),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "host" => self.host = Some(value.to_string()),
            "username" => self.username = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "port" => self.port = parse_number(key, value)?,
            "keyfile" => {
                self.keyfile = Some(expand_tilde(value).to_string_lossy().into_owned())
            }
            "timeout" => self.timeout = parse_number(key, value)?,
            "api_port" => self.api_port = parse_number(key, value)?,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Resolve the settings needed to open an SSH session.
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone().unwrap_or_default(),
            port: self.port,
            username: self.username.clone().unwrap_or_default(),
            keyfile: self.keyfile.as_deref().map(expand_tilde),
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

fn unknown_key(key: &str) -> Error {
    Error::Configuration(format!(
        "configuration key '{}' not found (known keys: {})",
        key,
        KEYS.join(", ")
    ))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("invalid value '{}' for {}", value, key)))
}

/// Resolved SSH connection settings passed to [`crate::ssh::Client::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub keyfile: Option<PathBuf>,
    /// Bounds the TCP connect and SSH handshake. Zero means no deadline
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn new<H: Into<String>, U: Into<String>>(host: H, username: U) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            keyfile: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.port, 22);
        assert_eq!(settings.timeout, 30);
    }

    #[test]
    fn toml_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.set("host", "nas.local").unwrap();
        settings.set("username", "admin").unwrap();
        settings.set("port", "2222").unwrap();
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.host.as_deref(), Some("nas.local"));
        assert_eq!(loaded.username.as_deref(), Some("admin"));
        assert_eq!(loaded.port, 2222);
        assert_eq!(loaded.timeout, 30);
    }

    #[test]
    fn yaml_file_is_read_as_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "host: nas.local\nusername: admin\ntimeout: 10\n").unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.host.as_deref(), Some("nas.local"));
        assert_eq!(loaded.timeout, 10);
        assert_eq!(loaded.port, 22);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("colour", "blue"),
            Err(Error::Configuration(_))
        ));
        assert!(settings.get("colour").is_err());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut settings = Settings::default();
        assert!(settings.set("port", "ssh").is_err());
        assert_eq!(settings.port, 22);
    }

    #[test]
    fn keyfile_tilde_is_expanded() {
        let mut settings = Settings::default();
        settings.set("keyfile", "~/.ssh/id_ed25519").unwrap();
        let keyfile = settings.keyfile.unwrap();
        assert!(!keyfile.starts_with('~'));
        assert!(keyfile.ends_with(".ssh/id_ed25519"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut settings = Settings::default();
        settings.set("host", "old.local").unwrap();

        let env: HashMap<&str, &str> = [("HOST", "new.local"), ("TIMEOUT", "5")].into();
        settings
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.host.as_deref(), Some("new.local"));
        assert_eq!(settings.timeout, 5);
    }

    #[test]
    fn connection_uses_resolved_values() {
        let mut settings = Settings::default();
        settings.set("host", "nas.local").unwrap();
        settings.set("timeout", "12").unwrap();

        let conn = settings.connection();
        assert_eq!(conn.host, "nas.local");
        assert_eq!(conn.username, "");
        assert_eq!(conn.port, 22);
        assert_eq!(conn.timeout, Duration::from_secs(12));
        assert!(conn.keyfile.is_none());
    }
}
