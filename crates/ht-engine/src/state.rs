//! State shared by watcher callbacks, the dispatcher and request handlers.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use ht_core::{
    ActivityState, Classifier, FileMetadata, FingerprintStore, HeartbeatBuilder, HeartbeatQueue,
    fingerprint, plugin_tag, unix_seconds,
};
use tracing::debug;

use crate::clock::Clock;
use crate::settings::Settings;
use crate::watch::{FileEvent, FileEventKind};

/// Why a change is being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A watcher reported the change.
    Watch(FileEventKind),
    /// A caller explicitly asked for a heartbeat.
    Manual,
}

impl ChangeOrigin {
    /// Creates and manual requests count as writes and skip content dedup.
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Manual | Self::Watch(FileEventKind::Created))
    }
}

/// What happened to a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The classifier rejected the path.
    Rejected,
    /// The file could not be read.
    Unreadable,
    /// A heartbeat for this file was enqueued too recently.
    RateLimited,
    /// Content is identical to the last observed fingerprint.
    Unchanged,
    /// A heartbeat was enqueued.
    Queued,
}

/// Mutable tracking state guarded by a single mutex.
#[derive(Debug, Default)]
pub(crate) struct TrackerState {
    pub fingerprints: FingerprintStore,
    pub queue: HeartbeatQueue,
    pub activity: ActivityState,
}

pub(crate) struct Shared {
    state: Mutex<TrackerState>,
    settings: RwLock<Settings>,
    tracked: RwLock<BTreeSet<PathBuf>>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    pub fn new(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            settings: RwLock::new(settings),
            tracked: RwLock::new(BTreeSet::new()),
            clock,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace_settings(&self, settings: Settings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(
            self.settings
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .max_file_size,
        )
    }

    pub fn tracked(&self) -> Vec<PathBuf> {
        self.tracked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn insert_tracked(&self, dir: PathBuf) {
        self.tracked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dir);
    }

    pub fn remove_tracked(&self, dir: &Path) -> bool {
        self.tracked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(dir)
    }

    /// Entry point for watcher callbacks.
    pub fn handle_event(&self, event: FileEvent) {
        let outcome = self.handle_change(&event.path, ChangeOrigin::Watch(event.kind));
        debug!(path = %event.path.display(), kind = ?event.kind, ?outcome, "file event");
    }

    /// Runs a change through classifier, rate limit, fingerprint and metadata
    /// resolution, enqueueing a heartbeat if it qualifies.
    pub fn handle_change(&self, path: &Path, origin: ChangeOrigin) -> ChangeOutcome {
        let settings = self.settings();
        if !Classifier::new(settings.max_file_size).should_track(path) {
            return ChangeOutcome::Rejected;
        }

        let now = self.now();
        let entity = path.to_string_lossy();
        let forced = origin.is_write();
        let rate_limited = |state: &TrackerState| {
            origin != ChangeOrigin::Manual
                && state.queue.is_rate_limited(
                    &entity,
                    unix_seconds(now),
                    settings.heartbeat_interval(),
                )
        };

        {
            let mut state = self.lock();
            if state.activity.touch(now) {
                debug!("activity resumed");
            }
            // Suppressed before reading so the stored fingerprint stays put.
            if rate_limited(&state) {
                return ChangeOutcome::RateLimited;
            }
        }

        let hash = match fingerprint(path) {
            Ok(hash) => hash,
            Err(err) => {
                debug!(path = %path.display(), %err, "skipping unreadable file");
                return ChangeOutcome::Unreadable;
            }
        };
        if !self.lock().fingerprints.has_changed(path, &hash, forced) {
            return ChangeOutcome::Unchanged;
        }

        let tracked = self.tracked();
        let metadata = FileMetadata::resolve(
            path,
            tracked.iter().map(PathBuf::as_path),
            settings.project.as_deref(),
        );
        let heartbeat = HeartbeatBuilder::new(path)
            .time(now)
            .project(metadata.project)
            .branch(metadata.branch)
            .language(metadata.language)
            .lines(metadata.lines)
            .is_write(forced)
            .plugin(plugin_tag(&settings.ide))
            .build();

        // Re-check under the lock: another callback may have committed this
        // file while metadata was being resolved.
        let mut state = self.lock();
        if rate_limited(&state) {
            return ChangeOutcome::RateLimited;
        }
        if !state.fingerprints.has_changed(path, &hash, forced) {
            return ChangeOutcome::Unchanged;
        }
        state.fingerprints.record(path, hash);
        state.queue.enqueue(heartbeat);
        ChangeOutcome::Queued
    }
}
