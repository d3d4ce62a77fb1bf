//! Settings for the schema enhancer
//!
//! Supports loading settings from:
//! - Default values
//! - Config file (schema-enhancer.toml)
//! - Environment variables (SCHEMA_ENHANCER__*)
//!
//! Settings are re-read on every refresh pass so that edits take effect
//! without a restart.
//!
//! ## Example config file (schema-enhancer.toml):
//! ```toml
//! schema_url = "https://developer.microsoft.com/json-schemas/sp/site-design-script-actions.schema.json"
//! serve_schema_url = "https://developer.microsoft.com/json-schemas/core-build/serve.schema.json"
//! cache_dir = "./.schema-cache"
//! fetch_timeout_secs = 30
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EnhancerError, Result};

/// File names searched for in the working directory, in order
pub const CONFIG_LOCATIONS: [&str; 2] = ["schema-enhancer.toml", ".schema-enhancer.toml"];

/// Settings consumed by the refresh pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancerSettings {
    /// Source of the site-script actions schema
    #[serde(default = "default_schema_url")]
    pub schema_url: String,

    /// Source of the serve configuration schema
    #[serde(default = "default_serve_schema_url")]
    pub serve_schema_url: String,

    /// Directory holding the enhanced artifacts
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Upper bound for one schema fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

// Default value functions
fn default_schema_url() -> String {
    "https://developer.microsoft.com/json-schemas/sp/site-design-script-actions.schema.json".to_string()
}

fn default_serve_schema_url() -> String {
    "https://developer.microsoft.com/json-schemas/core-build/serve.schema.json".to_string()
}

fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "familiar", "schema-enhancer")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".schema-cache"))
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for EnhancerSettings {
    fn default() -> Self {
        Self {
            schema_url: default_schema_url(),
            serve_schema_url: default_serve_schema_url(),
            cache_dir: default_cache_dir(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl EnhancerSettings {
    /// Load settings from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load settings, with an optional explicit file layered on top
    pub fn load_from(config_path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in CONFIG_LOCATIONS {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(xdg_config) = user_config_path() {
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_ENHANCER")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Source URL for an enhancer's configuration key
    pub fn url_for(&self, key: &str) -> Result<&str> {
        let url = match key {
            "schema_url" => self.schema_url.as_str(),
            "serve_schema_url" => self.serve_schema_url.as_str(),
            _ => "",
        };
        if url.trim().is_empty() {
            return Err(EnhancerError::MissingSetting { key: key.to_string() });
        }
        Ok(url)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Cache directory (resolves relative paths against the working directory)
    pub fn cache_path(&self) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.cache_dir)
        }
    }
}

/// Per-user settings file, if a home directory is known
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "familiar", "schema-enhancer")
        .map(|dirs| dirs.config_dir().join("schema-enhancer.toml"))
}

/// Provides settings to the orchestrator; called once per refresh pass
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Result<EnhancerSettings>;
}

/// Reads settings through the layered file/environment loader
#[derive(Debug, Clone, Default)]
pub struct LayeredSettings {
    pub config_path: Option<PathBuf>,
}

impl LayeredSettings {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    /// The file a change watcher should observe
    pub fn watched_path(&self) -> Option<PathBuf> {
        self.config_path.clone().or_else(|| {
            CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
                .or_else(|| user_config_path().filter(|p| p.exists()))
        })
    }
}

impl SettingsSource for LayeredSettings {
    fn load(&self) -> Result<EnhancerSettings> {
        Ok(EnhancerSettings::load_from(self.config_path.as_deref())?)
    }
}

/// Fixed settings, for tests and one-off runs
impl SettingsSource for EnhancerSettings {
    fn load(&self) -> Result<EnhancerSettings> {
        Ok(self.clone())
    }
}
