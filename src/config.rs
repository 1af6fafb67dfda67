use crate::clienv;
use crate::error::{HostError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Watch backend selection for the daemon's file watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// OS-native change notifications.
    #[default]
    Event,
    /// Periodic directory polling, for filesystems without native events.
    Poll,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Whether daemons may be auto-started on demand
    pub auto_start: Option<bool>,
    /// Periodic sync interval in seconds
    pub sync_interval_secs: Option<u64>,
    /// Watch backend: "event" or "poll"
    pub watch_mode: Option<WatchMode>,
    /// File-change debounce window in milliseconds
    pub debounce_ms: Option<u64>,
}

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

impl HostConfig {
    /// $SKILLHOST_CONFIG_DIR/config.toml or ~/.config/skillhost/config.toml
    pub fn config_path() -> PathBuf {
        clienv::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        tracing::trace!(path = %path.display(), "Loading host config");

        if !path.exists() {
            tracing::trace!("Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            HostError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;

        tracing::trace!(?config, "Host config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        tracing::trace!(path = %path.display(), "Saving host config");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| HostError::Config(format!("failed to serialize config: {e}")))?;
        fs::write(&path, content)?;

        tracing::trace!("Host config saved");
        Ok(())
    }

    /// Load the config file and create it with defaults when absent.
    pub fn load_or_create() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }
        Self::load()
    }

    // --- Effective values: environment overrides the file ---

    pub fn effective_auto_start(&self) -> bool {
        if clienv::daemon_disabled() {
            return false;
        }
        self.auto_start.unwrap_or(true)
    }

    pub fn effective_sync_interval(&self) -> Duration {
        let secs = clienv::sync_interval_secs()
            .or(self.sync_interval_secs)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    pub fn effective_watch_mode(&self) -> WatchMode {
        match clienv::watch_mode().as_deref() {
            Some("poll") => WatchMode::Poll,
            Some("event") => WatchMode::Event,
            Some(other) => {
                tracing::warn!(value = other, "Unknown watch mode, falling back to config");
                self.watch_mode.unwrap_or_default()
            }
            None => self.watch_mode.unwrap_or_default(),
        }
    }

    pub fn effective_debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }
}
