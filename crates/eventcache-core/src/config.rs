//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! where the API lives, where the store is kept, the storage budget, and the
//! timing of expiry, retries and background passes.
//!
//! Configuration is stored at `~/.config/eventcache/config.json`. Every field
//! has a default, so a partial (or missing) file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::cache::{EvictionPolicy, RepositorySettings};
use crate::sync::SchedulerSettings;

/// Application name used for config/data directory paths
const APP_NAME: &str = "eventcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Subdirectory holding one file per cached record
const STORE_DIR: &str = "records";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Overrides the platform data directory for the record store.
    pub store_dir: Option<PathBuf>,
    /// Storage budget in bytes. 0 disables quota-driven eviction.
    pub quota_bytes: u64,
    pub default_expiry_hours: i64,
    pub form_retention_days: i64,
    pub retry_limit: u32,
    pub sync_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub reconnect_delay_ms: u64,
    pub cleanup_threshold_percent: f64,
    pub eviction_threshold_percent: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            store_dir: None,
            quota_bytes: 50 * 1024 * 1024,
            default_expiry_hours: 24,
            form_retention_days: 7,
            retry_limit: 3,
            sync_interval_secs: 5 * 60,
            cleanup_interval_secs: 60 * 60,
            reconnect_delay_ms: 1000,
            cleanup_threshold_percent: 90.0,
            eviction_threshold_percent: 85.0,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Self = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config
                .validate()
                .map_err(|reason| anyhow::anyhow!("Invalid config file {}: {}", path.display(), reason))?;
            Ok(config)
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

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(STORE_DIR))
    }

    /// Check every value the cache and scheduler would otherwise trip over:
    /// zero timer periods, lifetimes that are not positive or overflow, and
    /// percentages outside 0..=100.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_base_url.trim().is_empty() {
            return Err("api_base_url must not be empty".to_string());
        }
        if self.sync_interval_secs == 0 {
            return Err("sync_interval_secs must be greater than 0".to_string());
        }
        if self.cleanup_interval_secs == 0 {
            return Err("cleanup_interval_secs must be greater than 0".to_string());
        }
        if self.retry_limit == 0 {
            return Err("retry_limit must be at least 1".to_string());
        }
        if !positive(Duration::try_hours(self.default_expiry_hours)) {
            return Err(format!("default_expiry_hours out of range: {}", self.default_expiry_hours));
        }
        if !positive(Duration::try_days(self.form_retention_days)) {
            return Err(format!("form_retention_days out of range: {}", self.form_retention_days));
        }
        for (name, value) in [
            ("cleanup_threshold_percent", self.cleanup_threshold_percent),
            ("eviction_threshold_percent", self.eviction_threshold_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("{} must be between 0 and 100, got {}", name, value));
            }
        }
        Ok(())
    }

    /// Expiry settings. Values `validate` would reject fall back to the
    /// defaults.
    pub fn repository_settings(&self) -> RepositorySettings {
        let defaults = RepositorySettings::default();
        RepositorySettings {
            default_expiry: Duration::try_hours(self.default_expiry_hours)
                .filter(|d| *d > Duration::zero())
                .unwrap_or(defaults.default_expiry),
            form_retention: Duration::try_days(self.form_retention_days)
                .filter(|d| *d > Duration::zero())
                .unwrap_or(defaults.form_retention),
        }
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            pressure_threshold: self.eviction_threshold_percent,
            ..EvictionPolicy::default()
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            sync_interval: StdDuration::from_secs(self.sync_interval_secs),
            cleanup_interval: StdDuration::from_secs(self.cleanup_interval_secs),
            reconnect_delay: StdDuration::from_millis(self.reconnect_delay_ms),
        }
    }
}

fn positive(duration: Option<Duration>) -> bool {
    duration.is_some_and(|d| d > Duration::zero())
}
