//! Configuration for the suspense cache.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{SuspenseError, SuspenseResult};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "suspense.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Name attached to the cache's log events.
    #[serde(default = "default_cache_name")]
    pub name: String,

    /// Lifespan in milliseconds for fulfilled entries whose lookup did not set
    /// one. Unset means entries stay until cleared.
    #[serde(default)]
    pub default_lifespan_ms: Option<u64>,
}

impl CacheConfig {
    pub fn default_lifespan(&self) -> Option<Duration> {
        self.default_lifespan_ms.map(Duration::from_millis)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_cache_name(),
            default_lifespan_ms: None,
        }
    }
}

fn default_cache_name() -> String {
    "suspense".to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> SuspenseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values the TOML schema alone does not constrain.
    pub fn validate(&self) -> SuspenseResult<()> {
        let level = self.general.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(SuspenseError::config(format!(
                "unknown log_level '{}', expected one of: {}",
                self.general.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        if !LOG_FORMATS.contains(&self.general.log_format.as_str()) {
            return Err(SuspenseError::config(format!(
                "unknown log_format '{}', expected one of: {}",
                self.general.log_format,
                LOG_FORMATS.join(", ")
            )));
        }

        if self.cache.name.trim().is_empty() {
            return Err(SuspenseError::config("cache name must not be empty"));
        }

        Ok(())
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SuspenseResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Tries to load configuration from the current directory or uses default.
    pub fn load_or_default() -> Self {
        Self::load(CONFIG_FILE).unwrap_or_else(|_| Self::default_config())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
