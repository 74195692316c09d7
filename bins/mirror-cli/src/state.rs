//! Persistent harvester state.
//!
//! Tracks the timestamp of the last successful run so the next run only
//! asks the change feed for what moved since. Stored next to the config
//! file as TOML; losing it is harmless, the next run just reconciles from
//! the epoch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorState {
    /// Start time of the last successful (non-dry) run.
    pub last_sync: Option<DateTime<Utc>>,
}

impl MirrorState {
    /// Loads state, defaulting to empty when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let state: Self = toml::from_str(&contents)?;
        Ok(state)
    }

    /// Writes the state as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self).map_err(ConfigError::from)?)?;
        Ok(())
    }

    /// Timestamp to reconcile from: the last successful run, or the epoch
    /// for a first run.
    pub fn sync_floor(&self) -> DateTime<Utc> {
        self.last_sync.unwrap_or(DateTime::UNIX_EPOCH)
    }
}
