//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the last used username and storage limits.
//!
//! Configuration is stored at `~/.config/salescache/config.json`. The API URL
//! and cache directory can be overridden with `SALESCACHE_API_URL` and
//! `SALESCACHE_CACHE_DIR`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "salescache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "https://api.salescache.app/v1";

/// Default storage quota, in the range of a browser origin's local storage.
const DEFAULT_STORAGE_QUOTA_BYTES: u64 = 10 * 1024 * 1024;

pub const ENV_API_URL: &str = "SALESCACHE_API_URL";
pub const ENV_CACHE_DIR: &str = "SALESCACHE_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub last_username: Option<String>,
    /// Byte limit for the cache directory; `None` disables the quota.
    pub storage_quota_bytes: Option<u64>,
    pub request_timeout_secs: u64,
    /// Set from `SALESCACHE_CACHE_DIR`, never persisted.
    #[serde(skip)]
    pub cache_dir_override: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            last_username: None,
            storage_quota_bytes: Some(DEFAULT_STORAGE_QUOTA_BYTES),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_dir_override: None,
        }
    }
}

impl Config {
    /// Load the config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|s| !s.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|s| !s.trim().is_empty()) {
            self.cache_dir_override = Some(PathBuf::from(dir.trim()));
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir_override {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        // Nested so save_to has to create the parent
        let path = dir.path().join(APP_NAME).join(CONFIG_FILE);
        let config = Config {
            last_username: Some("rep@acme".to_string()),
            storage_quota_bytes: None,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.last_username.as_deref(), Some("rep@acme"));
        assert_eq!(loaded.storage_quota_bytes, None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"last_username": "sam"}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(loaded.last_username.as_deref(), Some("sam"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            ENV_API_URL => Some(" http://localhost:8080 ".to_string()),
            ENV_CACHE_DIR => Some("/tmp/sc-cache".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/sc-cache"));
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some("  ".to_string()));
        assert_eq!(config, Config::default());
    }
}
