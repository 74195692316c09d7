//! Configuration for the labmirror CLI.
//!
//! Loaded from a TOML file with environment-variable overrides.
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Config file values
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading or writing the configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing the TOML configuration file.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Error serializing the configuration for writing.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration for the labmirror CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// The remote authoritative store being mirrored.
    pub source: StoreSettings,
    /// The local replica store being kept consistent.
    pub replica: StoreSettings,
    /// Run settings.
    pub sync: SyncSettings,
}

/// Connection settings for one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Base URL of the store's API.
    pub url: String,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
}

/// Run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Bounded worker pool size.
    pub workers: usize,
    /// Attachment apply strategy: `"per-entity"` or `"batched"`.
    pub strategy: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            source: StoreSettings {
                url: "https://source.example.org".to_string(),
                user: "harvester".to_string(),
                password: String::new(),
            },
            replica: StoreSettings {
                url: "http://localhost:8124".to_string(),
                user: "harvester".to_string(),
                password: String::new(),
            },
            sync: SyncSettings {
                workers: 4,
                strategy: "per-entity".to_string(),
            },
        }
    }
}

impl MirrorConfig {
    /// Loads configuration from a TOML file, creating it with defaults if
    /// it doesn't exist, then applies environment overrides and validates.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::info!(path = %path.display(), "config file missing, creating defaults");
            let config = Self::default();
            config.save(path)?;
            config
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Applies environment variable overrides.
    ///
    /// - `MIRROR_SOURCE_URL`, `MIRROR_SOURCE_USER`, `MIRROR_SOURCE_PASSWORD`
    /// - `MIRROR_REPLICA_URL`, `MIRROR_REPLICA_USER`, `MIRROR_REPLICA_PASSWORD`
    /// - `MIRROR_WORKERS`, `MIRROR_STRATEGY`
    pub fn apply_env_overrides(&mut self) {
        let vars: [(&str, &mut String); 6] = [
            ("MIRROR_SOURCE_URL", &mut self.source.url),
            ("MIRROR_SOURCE_USER", &mut self.source.user),
            ("MIRROR_SOURCE_PASSWORD", &mut self.source.password),
            ("MIRROR_REPLICA_URL", &mut self.replica.url),
            ("MIRROR_REPLICA_USER", &mut self.replica.user),
            ("MIRROR_REPLICA_PASSWORD", &mut self.replica.password),
        ];
        for (name, slot) in vars {
            if let Ok(value) = std::env::var(name) {
                *slot = value;
            }
        }
        if let Ok(value) = std::env::var("MIRROR_WORKERS") {
            if let Ok(workers) = value.parse() {
                self.sync.workers = workers;
            }
        }
        if let Ok(value) = std::env::var("MIRROR_STRATEGY") {
            self.sync.strategy = value;
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        for (label, store) in [("source", &self.source), ("replica", &self.replica)] {
            Url::parse(&store.url).map_err(|e| {
                ConfigError::Validation(format!("{label} url {}: {e}", store.url))
            })?;
            if store.user.is_empty() {
                return Err(ConfigError::Validation(format!("{label} user is empty")));
            }
        }
        if self.sync.workers == 0 {
            return Err(ConfigError::Validation(
                "sync.workers must be at least 1".to_string(),
            ));
        }
        if !matches!(self.sync.strategy.as_str(), "per-entity" | "batched") {
            return Err(ConfigError::Validation(format!(
                "sync.strategy must be per-entity or batched, got {}",
                self.sync.strategy
            )));
        }
        Ok(())
    }

    /// Source base URL, already validated.
    pub fn source_url(&self) -> Url {
        Url::parse(&self.source.url).expect("validated url")
    }

    /// Replica base URL, already validated.
    pub fn replica_url(&self) -> Url {
        Url::parse(&self.replica.url).expect("validated url")
    }
}
