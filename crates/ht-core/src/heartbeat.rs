//! The heartbeat record sent to the time-tracking API.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Editor name reported in the plugin tag when none is configured.
pub const DEFAULT_IDE: &str = "Zed";

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_PROJECT: &str = "unknown";

/// A single timestamped record of coding activity on one file.
///
/// Heartbeats are immutable once built. Use [`HeartbeatBuilder`] to construct
/// one; it resolves every default before the value exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Absolute path of the file.
    entity: String,
    #[serde(rename = "type")]
    entity_type: String,
    /// Unix timestamp in seconds.
    time: i64,
    category: String,
    project: String,
    branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    lineno: usize,
    cursorpos: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lines: Option<usize>,
    is_write: bool,
    #[serde(rename = "user_agent")]
    plugin: String,
}

impl Heartbeat {
    /// Path of the file this heartbeat describes.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Unix timestamp in seconds.
    pub const fn time(&self) -> i64 {
        self.time
    }

    /// Always `"coding"`.
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Approximated line number: the total line count, or 1.
    pub const fn lineno(&self) -> usize {
        self.lineno
    }

    /// Always 0; there is no editor integration to report a cursor.
    pub const fn cursorpos(&self) -> usize {
        self.cursorpos
    }

    pub const fn lines(&self) -> Option<usize> {
        self.lines
    }

    pub const fn is_write(&self) -> bool {
        self.is_write
    }

    /// User-agent tag identifying OS, runtime and editor.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }
}

/// Builds a [`Heartbeat`], filling in defaults for anything not set.
#[derive(Debug, Clone)]
pub struct HeartbeatBuilder {
    entity: String,
    time: Option<DateTime<Utc>>,
    project: Option<String>,
    branch: Option<String>,
    language: Option<String>,
    lines: Option<usize>,
    is_write: bool,
    plugin: Option<String>,
}

impl HeartbeatBuilder {
    /// Starts a heartbeat for the given file.
    pub fn new(entity: impl AsRef<Path>) -> Self {
        Self {
            entity: entity.as_ref().to_string_lossy().into_owned(),
            time: None,
            project: None,
            branch: None,
            language: None,
            lines: None,
            is_write: false,
            plugin: None,
        }
    }

    #[must_use]
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    #[must_use]
    pub fn language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    #[must_use]
    pub fn lines(mut self, lines: Option<usize>) -> Self {
        self.lines = lines;
        self
    }

    #[must_use]
    pub fn is_write(mut self, is_write: bool) -> Self {
        self.is_write = is_write;
        self
    }

    #[must_use]
    pub fn plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Resolves defaults and produces the immutable heartbeat.
    pub fn build(self) -> Heartbeat {
        let time = self.time.unwrap_or_else(Utc::now);
        let lineno = self.lines.filter(|&n| n > 0).unwrap_or(1);

        Heartbeat {
            entity: self.entity,
            entity_type: "file".to_string(),
            time: unix_seconds(time),
            category: "coding".to_string(),
            project: self
                .project
                .unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            branch: self.branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            language: self.language,
            lineno,
            cursorpos: 0,
            lines: self.lines,
            is_write: self.is_write,
            plugin: self.plugin.unwrap_or_else(|| plugin_tag(DEFAULT_IDE)),
        }
    }
}

/// Converts a timestamp to whole unix seconds.
pub fn unix_seconds(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}

/// Builds the user-agent tag sent with every heartbeat.
///
/// Format: `ht/<version> (<os>-<arch>) rust <ide>-wakatime/<version>`.
pub fn plugin_tag(ide: &str) -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        "ht/{version} ({}-{}) rust {ide}-wakatime/{version}",
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}
