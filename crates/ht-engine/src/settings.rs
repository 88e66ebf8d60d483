//! Engine settings and their persistence boundary.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ht_api::{ApiTarget, DEFAULT_API_URL};
use ht_core::{DEFAULT_IDE, DEFAULT_MAX_FILE_SIZE};
use serde::{Deserialize, Serialize};

use crate::contract::ConfigUpdate;
use crate::error::SettingsError;

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_ACTIVITY_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SEND_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 5;

/// Runtime settings of the engine.
///
/// Intervals are whole seconds so they round-trip through config files.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API key; heartbeats are dropped while unset.
    pub api_key: Option<String>,
    /// Base URL of the heartbeat API.
    pub api_url: String,
    /// Project name overriding directory-based resolution.
    pub project: Option<String>,
    /// Editor name reported in the user-agent tag.
    pub ide: String,
    /// Minimum spacing between heartbeats for the same file.
    pub heartbeat_interval: u64,
    /// Idle time after which pending heartbeats are discarded.
    pub activity_timeout: u64,
    /// Minimum spacing between send cycles.
    pub send_interval: u64,
    /// How often the dispatcher wakes up.
    pub tick_interval: u64,
    /// Files above this size (bytes) are ignored.
    pub max_file_size: u64,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("project", &self.project)
            .field("ide", &self.ide)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("activity_timeout", &self.activity_timeout)
            .field("send_interval", &self.send_interval)
            .field("tick_interval", &self.tick_interval)
            .field("max_file_size", &self.max_file_size)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            project: None,
            ide: DEFAULT_IDE.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            activity_timeout: DEFAULT_ACTIVITY_TIMEOUT_SECS,
            send_interval: DEFAULT_SEND_INTERVAL_SECS,
            tick_interval: DEFAULT_TICK_INTERVAL_SECS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Settings {
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub const fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.activity_timeout)
    }

    pub const fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval)
    }

    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval)
    }

    pub fn api_key_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Send target, or `None` when no usable API key is configured.
    pub fn api_target(&self) -> Option<ApiTarget> {
        let key = self.api_key.as_deref()?;
        ApiTarget::new(self.api_url.clone(), key).ok()
    }
}

/// Durable storage for settings changed at runtime.
pub trait SettingsStore: Send + Sync {
    /// Persists the fields `update` names. Their values are taken from
    /// `settings`, which already has the update applied.
    fn save(&self, settings: &Settings, update: &ConfigUpdate) -> Result<(), SettingsError>;

    /// Where settings are stored, for display.
    fn location(&self) -> Option<PathBuf> {
        None
    }
}

/// Keeps the last saved settings in memory.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saved: Mutex<Option<Settings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently saved settings.
    pub fn saved(&self) -> Option<Settings> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn save(&self, settings: &Settings, _update: &ConfigUpdate) -> Result<(), SettingsError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let settings = Settings::default();
        assert_eq!(settings.api_url, "https://hackatime.hackclub.com/api/v1");
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(settings.activity_timeout(), Duration::from_secs(120));
        assert_eq!(settings.max_file_size, 2 * 1024 * 1024);
        assert_eq!(settings.ide, "Zed");
        assert!(!settings.api_key_configured());
        assert!(settings.api_target().is_none());
    }

    #[test]
    fn test_blank_api_key_is_not_configured() {
        let settings = Settings {
            api_key: Some("  ".to_string()),
            ..Settings::default()
        };
        assert!(!settings.api_key_configured());
        assert!(settings.api_target().is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = Settings {
            api_key: Some("waka_secret".to_string()),
            ..Settings::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("waka_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_memory_store_keeps_last_save() {
        let store = MemorySettingsStore::new();
        assert!(store.saved().is_none());
        let settings = Settings {
            project: Some("p".to_string()),
            ..Settings::default()
        };
        store.save(&settings, &ConfigUpdate::default()).unwrap();
        assert_eq!(store.saved(), Some(settings));
    }
}
