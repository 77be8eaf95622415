//! Application configuration.
//!
//! Settings come from a TOML file (default `budget.toml`) and are then overridden by
//! environment variables, which may themselves come from a `.env` file. A missing file
//! is not an error: every setting has a default.

/// Database configuration and connection management
pub mod database;

/// Default budget module catalog seeded for new accounts
pub mod modules;

use crate::errors::{Error, Result};
use modules::{ModuleConfig, default_modules};
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "budget.toml";

/// Which store implementation backs the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Normalized tables through `SeaORM`
    #[default]
    Relational,
    /// One serialized record list per key
    Flat,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relational" | "sql" => Ok(Self::Relational),
            "flat" | "local" => Ok(Self::Flat),
            other => Err(Error::Config {
                message: format!("unknown storage backend `{other}`"),
            }),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Selected store implementation
    pub backend: StorageBackend,
    /// Connection URL for the relational store
    pub database_url: String,
    /// Key prefix for the flat store
    pub namespace: String,
    /// Root directory of the flat store's file engine; in-memory when absent
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: database::DEFAULT_DATABASE_URL.to_string(),
            namespace: "lb".to_string(),
            data_dir: None,
        }
    }
}

/// Longest accepted session lifetime, ten years.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Identity settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of a session
    pub session_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24,
        }
    }
}

impl AuthConfig {
    /// Checks that the session lifetime is between 0 and [`MAX_SESSION_TTL_HOURS`].
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(Error::Config {
                message: format!(
                    "session_ttl_hours must be between 0 and {MAX_SESSION_TTL_HOURS}, got {}",
                    self.session_ttl_hours
                ),
            });
        }
        Ok(())
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Storage settings
    pub storage: StorageConfig,
    /// Identity settings
    pub auth: AuthConfig,
    /// System modules seeded for new accounts
    pub modules: Vec<ModuleConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            modules: default_modules(),
        }
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse configuration: {e}"),
    })?;
    config.auth.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;
    parse_config(&contents)
}

/// Applies environment overrides on top of a parsed configuration.
///
/// `lookup` resolves a variable name; production code passes `std::env::var`.
pub fn apply_env_overrides<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        config.storage.database_url = url;
    }
    if let Some(backend) = lookup("BUDGET_STORAGE_BACKEND") {
        config.storage.backend = backend.parse()?;
    }
    if let Some(namespace) = lookup("BUDGET_NAMESPACE") {
        config.storage.namespace = namespace;
    }
    if let Some(dir) = lookup("BUDGET_DATA_DIR") {
        config.storage.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(ttl) = lookup("BUDGET_SESSION_TTL_HOURS") {
        config.auth.session_ttl_hours = ttl.trim().parse().map_err(|_| Error::Config {
            message: format!("BUDGET_SESSION_TTL_HOURS is not a number: `{ttl}`"),
        })?;
    }
    config.auth.validate()?;
    Ok(config)
}

/// Loads the full application configuration: `.env`, the config file, then overrides.
///
/// The file path can be changed with `BUDGET_CONFIG`.
pub fn load_app_configuration() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    let path = std::env::var("BUDGET_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        debug!("No configuration file at {}, using defaults", path);
        AppConfig::default()
    };
    let config = apply_env_overrides(config, |name| std::env::var(name).ok())?;
    info!(
        "Configuration loaded: backend={:?}, namespace={}",
        config.storage.backend, config.storage.namespace
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = parse_config("").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Relational);
        assert_eq!(config.storage.namespace, "lb");
        assert_eq!(config.auth.session_ttl_hours, 24);
        assert_eq!(config.modules.len(), 4);
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [storage]
            backend = "flat"
            namespace = "test"
            data_dir = "/tmp/budget"

            [auth]
            session_ttl_hours = 1

            [[modules]]
            name = "need"
            display_name = "Need"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Flat);
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/tmp/budget")));
        assert_eq!(config.auth.session_ttl_hours, 1);
        assert_eq!(config.modules.len(), 1);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[storage\nbackend = ");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("BUDGET_STORAGE_BACKEND", "flat"),
            ("BUDGET_DATA_DIR", "/var/lib/budget"),
        ]
        .into_iter()
        .collect();
        let config = apply_env_overrides(AppConfig::default(), |name| {
            vars.get(name).map(|v| (*v).to_string())
        })
        .unwrap();
        assert_eq!(config.storage.database_url, "sqlite::memory:");
        assert_eq!(config.storage.backend, StorageBackend::Flat);
        assert_eq!(
            config.storage.data_dir,
            Some(PathBuf::from("/var/lib/budget"))
        );
        assert_eq!(config.storage.namespace, "lb");
    }

    #[test]
    fn test_session_ttl_out_of_range_rejected() {
        for ttl in ["-1", "87601", "9223372036854775807"] {
            let result = parse_config(&format!("[auth]\nsession_ttl_hours = {ttl}"));
            assert!(matches!(result, Err(Error::Config { .. })), "{ttl}");

            let result = apply_env_overrides(AppConfig::default(), |name| {
                (name == "BUDGET_SESSION_TTL_HOURS").then(|| ttl.to_string())
            });
            assert!(matches!(result, Err(Error::Config { .. })), "{ttl}");
        }

        let config = apply_env_overrides(AppConfig::default(), |name| {
            (name == "BUDGET_SESSION_TTL_HOURS").then(|| "72".to_string())
        })
        .unwrap();
        assert_eq!(config.auth.session_ttl_hours, 72);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = apply_env_overrides(AppConfig::default(), |name| {
            (name == "BUDGET_STORAGE_BACKEND").then(|| "redis".to_string())
        });
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
