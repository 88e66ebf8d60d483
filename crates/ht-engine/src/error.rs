//! Errors surfaced to callers of the engine's synchronous operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::watch::WatchError;

/// Errors returned by `track`, `untrack`, `manual_heartbeat` and
/// `update_config`. Failures inside the background pipeline are logged, never
/// returned.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A request field was missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The directory or file does not exist, or is not tracked.
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// The filesystem watcher could not be started.
    #[error("failed to watch {}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: WatchError,
    },

    /// Updated settings could not be persisted.
    #[error("failed to persist settings: {0}")]
    Settings(#[from] SettingsError),
}

/// Settings persistence errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed.
    #[error("settings io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The existing settings file is not valid.
    #[error("failed to parse settings file {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// The settings could not be encoded.
    #[error("failed to encode settings: {0}")]
    Encode(String),
}
