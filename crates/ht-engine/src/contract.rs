//! Request and response shapes of the engine operations.
//!
//! These serialize to the JSON a front end hands back to its callers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TrackError;
use crate::settings::Settings;

/// Body of `track` and `untrack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRequest {
    #[serde(default)]
    pub path: PathBuf,
}

/// Body of a manual heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub file: PathBuf,
}

/// Outcome of an action request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Renders an operation result with `message` on success.
    pub fn from_result<T>(
        result: &Result<T, TrackError>,
        message: impl FnOnce() -> String,
    ) -> Self {
        match result {
            Ok(_) => Self::ok(message()),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// Counters describing the engine at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub tracked_directories: Vec<PathBuf>,
    /// Files with a recorded fingerprint.
    pub tracked_files: usize,
    pub pending_heartbeats: usize,
    /// Entity path to epoch seconds of its last enqueued heartbeat.
    pub last_heartbeats: BTreeMap<String, i64>,
    pub is_tracking_active: bool,
    /// Seconds since the last accepted event, rounded to 0.1.
    pub time_since_last_activity: f64,
}

/// Response of `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub api_key_configured: bool,
    pub api_url: String,
    pub heartbeat_interval: u64,
    pub activity_timeout: u64,
    pub stats: TrackerStats,
}

/// Response of `config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub api_url: String,
    pub api_key_configured: bool,
    pub project: Option<String>,
    pub ide: String,
    pub heartbeat_interval: u64,
    pub config_file: Option<PathBuf>,
}

impl ConfigResponse {
    pub fn new(settings: &Settings, config_file: Option<PathBuf>) -> Self {
        Self {
            api_url: settings.api_url.clone(),
            api_key_configured: settings.api_key_configured(),
            project: settings.project.clone(),
            ide: settings.ide.clone(),
            heartbeat_interval: settings.heartbeat_interval,
            config_file,
        }
    }
}

/// Partial settings change. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    /// An empty string clears the key.
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    /// An empty string clears the override.
    pub project: Option<String>,
    pub ide: Option<String>,
    pub heartbeat_interval: Option<u64>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `settings` with this update applied.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Validation`] for a non-http(s) or empty API URL,
    /// a blank IDE name, or a zero heartbeat interval.
    pub fn apply_to(&self, settings: &Settings) -> Result<Settings, TrackError> {
        let mut next = settings.clone();

        if let Some(key) = &self.api_key {
            let key = key.trim();
            next.api_key = (!key.is_empty()).then(|| key.to_string());
        }
        if let Some(url) = &self.api_url {
            let url = url.trim();
            if url.is_empty() {
                return Err(TrackError::Validation("api_url cannot be empty".to_string()));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(TrackError::Validation(format!(
                    "api_url must start with http:// or https://, got {url}"
                )));
            }
            next.api_url = url.to_string();
        }
        if let Some(project) = &self.project {
            let project = project.trim();
            next.project = (!project.is_empty()).then(|| project.to_string());
        }
        if let Some(ide) = &self.ide {
            let ide = ide.trim();
            if ide.is_empty() {
                return Err(TrackError::Validation("ide cannot be empty".to_string()));
            }
            next.ide = ide.to_string();
        }
        if let Some(interval) = self.heartbeat_interval {
            if interval == 0 {
                return Err(TrackError::Validation(
                    "heartbeat_interval must be at least 1 second".to_string(),
                ));
            }
            next.heartbeat_interval = interval;
        }

        Ok(next)
    }
}

/// Rounds seconds to one decimal place.
pub(crate) fn round_tenths(secs: f64) -> f64 {
    (secs * 10.0).round() / 10.0
}
