//! Configuration loading and persistence.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use ht_engine::contract::ConfigUpdate;
use ht_engine::{Settings, SettingsError, SettingsStore};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the heartbeat endpoint.
    pub api_key: Option<String>,
    /// Base URL of the heartbeat API.
    pub api_url: String,
    /// Project name used for every heartbeat instead of the tracked directory.
    pub project: Option<String>,
    /// Editor name reported in the user agent.
    pub ide: String,
    /// Seconds between heartbeats for the same file.
    pub heartbeat_interval: u64,
    /// Seconds of inactivity before pending heartbeats are dropped.
    pub activity_timeout: u64,
    /// Seconds between send cycles.
    pub send_interval: u64,
    /// Seconds between dispatcher wake-ups.
    pub tick_interval: u64,
    /// Largest file size in bytes that is tracked.
    pub max_file_size: u64,
    /// Directories tracked by `ht watch` when none are given.
    pub directories: Vec<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("project", &self.project)
            .field("ide", &self.ide)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("activity_timeout", &self.activity_timeout)
            .field("send_interval", &self.send_interval)
            .field("tick_interval", &self.tick_interval)
            .field("max_file_size", &self.max_file_size)
            .field("directories", &self.directories)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(Settings::default(), Vec::new())
    }
}

impl Config {
    pub fn from_settings(settings: Settings, directories: Vec<PathBuf>) -> Self {
        Self {
            api_key: settings.api_key,
            api_url: settings.api_url,
            project: settings.project,
            ide: settings.ide,
            heartbeat_interval: settings.heartbeat_interval,
            activity_timeout: settings.activity_timeout,
            send_interval: settings.send_interval,
            tick_interval: settings.tick_interval,
            max_file_size: settings.max_file_size,
            directories,
        }
    }

    /// Engine settings carried by this configuration.
    pub fn settings(&self) -> Settings {
        Settings {
            api_key: self.api_key.clone(),
            api_url: self.api_url.clone(),
            project: self.project.clone(),
            ide: self.ide.clone(),
            heartbeat_interval: self.heartbeat_interval,
            activity_timeout: self.activity_timeout,
            send_interval: self.send_interval,
            tick_interval: self.tick_interval,
            max_file_size: self.max_file_size,
        }
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = default_config_file() {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // HT_API_KEY, HT_HEARTBEAT_INTERVAL, ...
        figment = figment.merge(Env::prefixed("HT_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for ht.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ht"))
}

/// Returns the default config file path.
///
/// On Linux: `~/.config/ht/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    dirs_config_path().map(|p| p.join("config.toml"))
}

/// Persists configuration changes into a TOML config file.
///
/// Only keys an update names are written. Everything else in the file,
/// and values that came from the environment or defaults, is left alone.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_table(&self) -> Result<toml::Table, SettingsError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(toml::Table::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        content.parse::<toml::Table>().map_err(|e| SettingsError::Decode {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}

impl SettingsStore for TomlSettingsStore {
    fn save(&self, settings: &Settings, update: &ConfigUpdate) -> Result<(), SettingsError> {
        let mut table = self.read_table()?;

        if update.api_key.is_some() {
            assign(&mut table, "api_key", settings.api_key.clone().map(toml::Value::String));
        }
        if update.api_url.is_some() {
            assign(&mut table, "api_url", Some(toml::Value::String(settings.api_url.clone())));
        }
        if update.project.is_some() {
            assign(&mut table, "project", settings.project.clone().map(toml::Value::String));
        }
        if update.ide.is_some() {
            assign(&mut table, "ide", Some(toml::Value::String(settings.ide.clone())));
        }
        if update.heartbeat_interval.is_some() {
            let secs = i64::try_from(settings.heartbeat_interval)
                .map_err(|e| SettingsError::Encode(e.to_string()))?;
            assign(&mut table, "heartbeat_interval", Some(toml::Value::Integer(secs)));
        }

        let content = toml::to_string(&table).map_err(|e| SettingsError::Encode(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        // Staged write; the rename replaces the file in one step.
        let staged = self.path.with_extension("toml.tmp");
        fs::write(&staged, content).map_err(|e| self.io_error(e))?;
        fs::rename(&staged, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// Sets `key`, or removes it when the value was cleared.
fn assign(table: &mut toml::Table, key: &str, value: Option<toml::Value>) {
    match value {
        Some(value) => {
            table.insert(key.to_string(), value);
        }
        None => {
            table.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file_ends_with_ht() {
        let path = default_config_file().unwrap();
        assert_eq!(path.file_name().unwrap(), "config.toml");
        assert_eq!(path.parent().unwrap().file_name().unwrap(), "ht");
    }

    #[test]
    fn test_default_config_matches_engine_defaults() {
        let config = Config::default();
        assert_eq!(config.settings(), Settings::default());
        assert!(config.directories.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "api_key = \"waka_123\"\nheartbeat_interval = 45\ndirectories = [\"/src/app\"]\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.as_path())).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("waka_123"));
        assert_eq!(config.heartbeat_interval, 45);
        assert_eq!(config.directories, vec![PathBuf::from("/src/app")]);
        assert_eq!(config.ide, "Zed");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            api_key: Some("waka_secret".to_string()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("waka_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_store_writes_only_updated_keys() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested/config.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "directories = [\"/src/app\"]\nproject = \"old\"\nide = \"Helix\"\n",
        )
        .unwrap();

        let store = TomlSettingsStore::new(&path);
        let update = ConfigUpdate {
            api_key: Some("waka_new".to_string()),
            project: Some(String::new()),
            ..ConfigUpdate::default()
        };
        // The running settings carry values from other sources too.
        let current = Settings {
            ide: "Zed".to_string(),
            heartbeat_interval: 90,
            ..Settings::default()
        };
        let settings = update.apply_to(&current).unwrap();
        store.save(&settings, &update).unwrap();

        let written: toml::Table = fs::read_to_string(&path).unwrap().parse().unwrap();
        assert_eq!(written["api_key"].as_str(), Some("waka_new"));
        assert!(!written.contains_key("project"));
        assert_eq!(written["ide"].as_str(), Some("Helix"));
        assert!(!written.contains_key("heartbeat_interval"));
        assert!(!written.contains_key("api_url"));
        assert!(written.contains_key("directories"));
        assert!(!path.with_extension("toml.tmp").exists());
        assert_eq!(store.location(), Some(path));
    }

    #[test]
    fn test_store_creates_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ht/config.toml");
        let update = ConfigUpdate {
            heartbeat_interval: Some(45),
            ..ConfigUpdate::default()
        };
        let settings = update.apply_to(&Settings::default()).unwrap();
        TomlSettingsStore::new(&path).save(&settings, &update).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written.trim(), "heartbeat_interval = 45");
    }

    #[test]
    fn test_store_rejects_invalid_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "not = [valid").unwrap();

        let err = TomlSettingsStore::new(&path)
            .save(&Settings::default(), &ConfigUpdate::default())
            .unwrap_err();
        assert!(matches!(err, SettingsError::Decode { .. }));
    }
}
