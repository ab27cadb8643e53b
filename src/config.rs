use crate::error::ConfigError;
use crate::models::Recipient;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://www.imified.com/api/bot/";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const MAX_TIMEOUT_SECONDS: i64 = 3600;
const REQUIRED_KEYS: [&str; 3] = ["botkey", "username", "password"];
const SECRET_KEYS: [&str; 1] = ["password"];

/// Key/value settings for a bot, backed by a TOML table.
///
/// Recognised keys are `botkey`, `username`, `password`, `recipient`,
/// `endpoint` and `timeout_seconds`. Any other key is kept and can be read
/// back, but is not used by the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: toml::Table,
}

impl Config {
    pub fn new(values: toml::Table) -> Self {
        Self { values }
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = config_file_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            ConfigError::Invalid(format!(
                "Cannot read config at {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let values: toml::Table = toml::from_str(&contents).map_err(|e| {
            ConfigError::Invalid(format!("Invalid TOML in {}: {}", config_path.display(), e))
        })?;
        let config = Self::new(values);
        config.validate()?;
        tracing::debug!(path = %config_path.display(), "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for key in REQUIRED_KEYS {
            match self.get(key) {
                Some(toml::Value::String(s)) if !s.is_empty() => {}
                Some(toml::Value::String(_)) => anyhow::bail!("{key} must not be empty"),
                Some(_) => anyhow::bail!("{key} must be a string"),
                None => anyhow::bail!("{key} is required"),
            }
        }
        if let Some(value) = self.get("timeout_seconds") {
            match value.as_integer() {
                Some(secs) if (1..=MAX_TIMEOUT_SECONDS).contains(&secs) => {}
                _ => anyhow::bail!("timeout_seconds must be between 1 and {MAX_TIMEOUT_SECONDS}"),
            }
        }
        if let Some(value) = self.get("recipient")
            && Recipient::from_toml(value).is_none()
        {
            anyhow::bail!("recipient must be a string, a list of userkeys or a table");
        }
        Ok(())
    }

    /// The whole mapping.
    pub fn values(&self) -> &toml::Table {
        &self.values
    }

    /// Swaps in a new mapping wholesale.
    pub fn replace(&mut self, values: toml::Table) {
        self.values = values;
    }

    /// Looks up `key` verbatim, then as a dotted path through nested tables.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }

        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(toml::Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn botkey(&self) -> &str {
        self.get_str("botkey").unwrap_or_default()
    }

    pub fn username(&self) -> &str {
        self.get_str("username").unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.get_str("password").unwrap_or_default()
    }

    /// Default recipient used when a message is sent without one.
    pub fn recipient(&self) -> Option<Recipient> {
        self.get("recipient").and_then(Recipient::from_toml)
    }

    pub fn endpoint(&self) -> &str {
        self.get_str("endpoint").unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn timeout(&self) -> Duration {
        let secs = self
            .get("timeout_seconds")
            .and_then(toml::Value::as_integer)
            .and_then(|s| u64::try_from(s).ok())
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        Duration::from_secs(secs)
    }

    /// Copy of the mapping with secrets masked, for display.
    pub fn redacted(&self) -> toml::Table {
        let mut values = self.values.clone();
        for key in SECRET_KEYS {
            if let Some(value) = values.get_mut(key) {
                *value = toml::Value::String("********".to_string());
            }
        }
        values
    }
}

pub fn config_file_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ConfigError::Invalid("Cannot determine home directory".to_string()))?;
    Ok(home.join(".config").join("imified").join("config.toml"))
}
