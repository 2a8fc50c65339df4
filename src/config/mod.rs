//! Configuration management.
//!
//! Settings live in `~/.erp/config.json` (override the directory with
//! `ERP_CONFIG_DIR`). Every setting resolves with the same priority:
//!
//! 1. Explicit CLI flag
//! 2. Environment variable (`ERP_API_URL`, `ERP_API_TOKEN`,
//!    `ERP_POLL_INTERVAL_MS`, `ERP_TIMEOUT_SECS`)
//! 3. Config file
//! 4. Built-in default

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_CONFIG_DIR: &str = "ERP_CONFIG_DIR";
pub const ENV_API_URL: &str = "ERP_API_URL";
pub const ENV_API_TOKEN: &str = "ERP_API_TOKEN";
pub const ENV_POLL_INTERVAL_MS: &str = "ERP_POLL_INTERVAL_MS";
pub const ENV_TIMEOUT_SECS: &str = "ERP_TIMEOUT_SECS";

/// Contents of `config.json`. Absent keys fall through to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ErpConfig {
    /// Overlay `other` onto `self`: set keys in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_url: other.api_url.or(self.api_url),
            api_token: other.api_token.or(self.api_token),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub api_url: String,
    pub api_token: Option<String>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ApiOverrides {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
}

/// Directory holding `config.json`.
///
/// # Errors
///
/// Returns `Error::Config` if no home directory can be determined.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".erp"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Path of `config.json`.
///
/// # Errors
///
/// Same as [`config_dir`].
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Load the config file, or defaults if it does not exist.
///
/// # Errors
///
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<ErpConfig> {
    load_config_from(&config_path()?)
}

/// Load a config file from an explicit path.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_from(path: &Path) -> Result<ErpConfig> {
    if !path.exists() {
        return Ok(ErpConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
}

/// Merge `changes` into the stored config and save it.
///
/// # Errors
///
/// Returns `Error::Config` if the file cannot be read or written.
pub fn save_config(changes: &ErpConfig) -> Result<ErpConfig> {
    save_config_to(&config_path()?, changes)
}

/// Merge `changes` into the config at `path` and save it.
///
/// # Errors
///
/// Same as [`save_config`].
pub fn save_config_to(path: &Path, changes: &ErpConfig) -> Result<ErpConfig> {
    let merged = load_config_from(path)?.merge(changes.clone());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(&merged)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(merged)
}

/// Resolve settings from flags, the process environment and the config file.
///
/// # Errors
///
/// Returns `Error::Config` for an unreadable config file or invalid values.
pub fn resolve_settings(overrides: &ApiOverrides) -> Result<ApiSettings> {
    let file = load_config()?;
    resolve_with(overrides, |key| std::env::var(key).ok(), &file)
}

/// Resolve settings against an explicit environment lookup.
///
/// # Errors
///
/// Returns `Error::Config` if the URL is not http(s) or a numeric setting
/// does not parse.
pub fn resolve_with<E>(overrides: &ApiOverrides, lookup: E, file: &ErpConfig) -> Result<ApiSettings>
where
    E: Fn(&str) -> Option<String>,
{
    let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let api_url = overrides
        .api_url
        .clone()
        .or_else(|| env(ENV_API_URL))
        .or_else(|| file.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "API URL must start with http:// or https://, got '{api_url}'"
        )));
    }

    let api_token = overrides
        .api_token
        .clone()
        .or_else(|| env(ENV_API_TOKEN))
        .or_else(|| file.api_token.clone())
        .filter(|t| !t.is_empty());

    let poll_interval_ms = match env(ENV_POLL_INTERVAL_MS) {
        Some(raw) => parse_number(ENV_POLL_INTERVAL_MS, &raw)?,
        None => file.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
    };

    let timeout_secs = match env(ENV_TIMEOUT_SECS) {
        Some(raw) => parse_number(ENV_TIMEOUT_SECS, &raw)?,
        None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
    };

    if poll_interval_ms == 0 {
        return Err(Error::Config("Poll interval must be at least 1 ms".into()));
    }
    if timeout_secs == 0 {
        return Err(Error::Config("Request timeout must be at least 1 s".into()));
    }

    Ok(ApiSettings {
        api_url,
        api_token,
        poll_interval: Duration::from_millis(poll_interval_ms),
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a whole number, got '{raw}'")))
}
