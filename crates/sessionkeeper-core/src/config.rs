//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which includes
//! the token endpoint, the last used username and the session policy.
//!
//! Configuration is stored at `~/.config/sessionkeeper/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::auth::{ExpiryPolicy, SessionPolicy};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sessionkeeper";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Vault file name in cache directory
const VAULT_FILE: &str = "session.vault";

pub const ENV_AUTH_URL: &str = "SESSIONKEEPER_AUTH_URL";
pub const ENV_USERNAME: &str = "SESSIONKEEPER_USERNAME";

/// Sessions are considered stale two hours after login unless configured.
const DEFAULT_VALIDITY_MINUTES: i64 = 120;

/// Longest accepted validity window (one year).
const MAX_VALIDITY_MINUTES: i64 = 366 * 24 * 60;

fn default_validity_minutes() -> i64 {
    DEFAULT_VALIDITY_MINUTES
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub last_username: Option<String>,
    #[serde(default = "default_validity_minutes")]
    pub validity_minutes: i64,
    #[serde(default)]
    pub refresh_margin_minutes: i64,
    #[serde(default)]
    pub expiry: ExpiryPolicy,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_url: None,
            last_username: None,
            validity_minutes: DEFAULT_VALIDITY_MINUTES,
            refresh_margin_minutes: 0,
            expiry: ExpiryPolicy::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override file values with environment variables when set
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_AUTH_URL).ok(),
            std::env::var(ENV_USERNAME).ok(),
        );
    }

    fn apply_overrides(&mut self, auth_url: Option<String>, username: Option<String>) {
        if let Some(url) = auth_url.filter(|u| !u.trim().is_empty()) {
            self.auth_url = Some(url.trim().to_string());
        }
        if let Some(user) = username.filter(|u| !u.trim().is_empty()) {
            self.last_username = Some(user.trim().to_string());
        }
    }

    /// Build the holder policy, rejecting nonsensical windows
    pub fn policy(&self) -> Result<SessionPolicy> {
        if self.validity_minutes <= 0 || self.validity_minutes > MAX_VALIDITY_MINUTES {
            bail!(
                "validity_minutes must be between 1 and {} (got {})",
                MAX_VALIDITY_MINUTES,
                self.validity_minutes
            );
        }
        if self.refresh_margin_minutes < 0 || self.refresh_margin_minutes >= self.validity_minutes {
            bail!(
                "refresh_margin_minutes must be between 0 and {} (got {})",
                self.validity_minutes - 1,
                self.refresh_margin_minutes
            );
        }
        let window = Duration::try_minutes(self.validity_minutes)
            .context("validity_minutes is out of range")?;
        let margin = Duration::try_minutes(self.refresh_margin_minutes)
            .context("refresh_margin_minutes is out of range")?;
        Ok(SessionPolicy::new(window)
            .with_refresh_margin(margin)
            .with_expiry(self.expiry))
    }

    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn vault_path(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(VAULT_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.validity_minutes, 120);
        assert_eq!(config.expiry, ExpiryPolicy::Absolute);
        assert_eq!(config.request_timeout(), StdDuration::from_secs(30));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("sessionkeeper-config-{}", std::process::id()))
            .join(CONFIG_FILE);
        let config = Config {
            auth_url: Some("https://id.example.com/token".to_string()),
            last_username: Some("alice".to_string()),
            validity_minutes: 30,
            refresh_margin_minutes: 5,
            expiry: ExpiryPolicy::Sliding,
            request_timeout_secs: 10,
        };
        config.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"sliding\""));
        assert_eq!(Config::load_from(&path).unwrap(), config);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_gives_default() {
        let path = std::env::temp_dir().join("sessionkeeper-does-not-exist").join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_policy_validation() {
        let policy = Config::default().policy().unwrap();
        assert_eq!(policy.validity_window, Duration::hours(2));
        assert_eq!(policy.refresh_margin, Duration::zero());

        let bad_window = Config { validity_minutes: 0, ..Config::default() };
        assert!(bad_window.policy().is_err());

        let bad_margin = Config { refresh_margin_minutes: 120, ..Config::default() };
        assert!(bad_margin.policy().is_err());

        let huge: Config = serde_json::from_str(r#"{"validity_minutes":9223372036854775807}"#).unwrap();
        assert!(huge.policy().is_err());

        let year_and_a_day = Config { validity_minutes: MAX_VALIDITY_MINUTES + 1, ..Config::default() };
        assert!(year_and_a_day.policy().is_err());

        let longest = Config { validity_minutes: MAX_VALIDITY_MINUTES, ..Config::default() };
        assert_eq!(longest.policy().unwrap().validity_window, Duration::days(366));

        let negative_margin = Config { refresh_margin_minutes: -1, ..Config::default() };
        assert!(negative_margin.policy().is_err());
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = Config {
            last_username: Some("alice".to_string()),
            ..Config::default()
        };
        config.apply_overrides(Some(" https://id.example.com/token ".to_string()), Some("  ".to_string()));
        assert_eq!(config.auth_url.as_deref(), Some("https://id.example.com/token"));
        assert_eq!(config.last_username.as_deref(), Some("alice"));
    }
}
