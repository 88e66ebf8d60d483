//! The tracking service: one instance per set of tracked directories.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ht_api::HeartbeatTransport;
use ht_core::Heartbeat;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::contract::{
    ActionResponse, ConfigResponse, ConfigUpdate, HeartbeatRequest, StatusResponse, TrackRequest,
    TrackerStats, round_tenths,
};
use crate::dispatcher::{Dispatcher, TickOutcome, Ticker};
use crate::error::TrackError;
use crate::registry::{AddOutcome, WatchRegistry, normalize};
use crate::settings::{MemorySettingsStore, Settings, SettingsStore};
use crate::state::{ChangeOrigin, ChangeOutcome, Shared};
use crate::watch::{NotifyBackend, WatchBackend};

/// Builds a [`Tracker`] with injectable collaborators.
pub struct TrackerBuilder<T> {
    settings: Settings,
    transport: Arc<T>,
    backend: Option<Arc<dyn WatchBackend>>,
    store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<T: HeartbeatTransport> TrackerBuilder<T> {
    pub fn new(settings: Settings, transport: T) -> Self {
        Self {
            settings,
            transport: Arc::new(transport),
            backend: None,
            store: None,
            clock: None,
        }
    }

    /// Defaults to [`NotifyBackend`].
    #[must_use]
    pub fn watch_backend(mut self, backend: Arc<dyn WatchBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Defaults to [`MemorySettingsStore`].
    #[must_use]
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Tracker<T> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let backend = self.backend.unwrap_or_else(|| Arc::new(NotifyBackend));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySettingsStore::new()));

        Tracker {
            shared: Arc::new(Shared::new(self.settings, clock)),
            registry: WatchRegistry::new(backend),
            transport: self.transport,
            store,
            config_lock: Mutex::new(()),
            worker: Mutex::new(None),
        }
    }
}

struct Worker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Watches directories, turns file changes into heartbeats and ships them.
///
/// Operations other than [`Tracker::shutdown`] are synchronous and safe to
/// call from any thread while the dispatcher runs.
pub struct Tracker<T> {
    shared: Arc<Shared>,
    registry: WatchRegistry,
    transport: Arc<T>,
    store: Arc<dyn SettingsStore>,
    config_lock: Mutex<()>,
    worker: Mutex<Option<Worker>>,
}

impl<T> fmt::Debug for Tracker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<T: HeartbeatTransport> Tracker<T> {
    pub fn builder(settings: Settings, transport: T) -> TrackerBuilder<T> {
        TrackerBuilder::new(settings, transport)
    }

    /// Starts watching `path` recursively.
    ///
    /// Existing files are fingerprinted without producing heartbeats.
    /// Tracking an already tracked directory succeeds without changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty, missing, not a directory, or
    /// cannot be watched.
    pub fn track(&self, path: &Path) -> Result<AddOutcome, TrackError> {
        self.registry.add(&self.shared, path)
    }

    /// Stops watching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::NotFound`] if `path` is not tracked.
    pub fn untrack(&self, path: &Path) -> Result<(), TrackError> {
        self.registry.remove(&self.shared, path)
    }

    /// Enqueues a write heartbeat for `file` regardless of content changes
    /// and the per-file rate limit.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::NotFound`] for a missing file and
    /// [`TrackError::Validation`] for a directory, an ignored file or an
    /// unreadable one.
    pub fn manual_heartbeat(&self, file: &Path) -> Result<ChangeOutcome, TrackError> {
        let file = normalize(file)?;
        if !file.exists() {
            return Err(TrackError::NotFound { what: "file", path: file });
        }
        if file.is_dir() {
            return Err(TrackError::Validation(format!(
                "not a file: {}",
                file.display()
            )));
        }

        match self.shared.handle_change(&file, ChangeOrigin::Manual) {
            ChangeOutcome::Rejected => Err(TrackError::Validation(format!(
                "file is excluded from tracking: {}",
                file.display()
            ))),
            ChangeOutcome::Unreadable => Err(TrackError::Validation(format!(
                "could not read file: {}",
                file.display()
            ))),
            outcome => {
                info!(file = %file.display(), ?outcome, "manual heartbeat");
                Ok(outcome)
            }
        }
    }

    pub fn status(&self) -> StatusResponse {
        let settings = self.shared.settings();
        let now = self.shared.now();
        let tracked_directories = self.shared.tracked();

        let state = self.shared.lock();
        let stats = TrackerStats {
            tracked_directories,
            tracked_files: state.fingerprints.len(),
            pending_heartbeats: state.queue.len(),
            last_heartbeats: state
                .queue
                .last_heartbeats()
                .iter()
                .map(|(entity, time)| (entity.clone(), *time))
                .collect(),
            is_tracking_active: state.activity.is_active(),
            time_since_last_activity: round_tenths(
                state.activity.since_last_activity(now).as_secs_f64(),
            ),
        };

        StatusResponse {
            status: "running".to_string(),
            api_key_configured: settings.api_key_configured(),
            api_url: settings.api_url,
            heartbeat_interval: settings.heartbeat_interval,
            activity_timeout: settings.activity_timeout,
            stats,
        }
    }

    pub fn config(&self) -> ConfigResponse {
        ConfigResponse::new(&self.shared.settings(), self.store.location())
    }

    /// Current settings.
    pub fn settings(&self) -> Settings {
        self.shared.settings()
    }

    /// Tracked directories, sorted.
    pub fn tracked(&self) -> Vec<PathBuf> {
        self.shared.tracked()
    }

    /// Snapshot of the pending heartbeats in send order.
    pub fn pending(&self) -> Vec<Heartbeat> {
        self.shared.lock().queue.pending().to_vec()
    }

    /// Validates and persists `update`, then applies it.
    ///
    /// Nothing changes in memory if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Validation`] for invalid values and
    /// [`TrackError::Settings`] if the store fails.
    pub fn update_config(&self, update: &ConfigUpdate) -> Result<ConfigResponse, TrackError> {
        let _guard = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let next = update.apply_to(&self.shared.settings())?;
        self.store.save(&next, update)?;
        self.shared.replace_settings(next);

        info!("configuration updated");
        Ok(self.config())
    }

    /// A dispatcher over this tracker's queue, for driving ticks by hand.
    pub fn dispatcher(&self) -> Dispatcher<T> {
        Dispatcher::new(Arc::clone(&self.shared), Arc::clone(&self.transport))
    }

    /// Runs the dispatcher on the current tokio runtime until
    /// [`Tracker::shutdown`].
    ///
    /// Returns a receiver of tick outcomes; dropping it is fine. Returns
    /// `None` if a dispatcher is already running.
    pub fn spawn_dispatcher<K>(&self, ticker: K) -> Option<mpsc::UnboundedReceiver<TickOutcome>>
    where
        K: Ticker + 'static,
    {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            debug!("dispatcher already running");
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let dispatcher = self.dispatcher().with_observer(tx);
        let task = tokio::spawn(dispatcher.run(ticker, cancel.clone()));

        *worker = Some(Worker { cancel, task });
        Some(rx)
    }

    /// Stops the dispatcher and every watch. No file events are processed
    /// once this returns.
    pub async fn shutdown(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Worker { cancel, task }) = worker {
            cancel.cancel();
            if let Err(e) = task.await {
                warn!("dispatcher task failed: {e}");
            }
        }

        self.registry.shutdown(&self.shared);
        info!("tracker stopped");
    }

    /// `track` rendered as an action response.
    pub fn track_action(&self, request: &TrackRequest) -> ActionResponse {
        let result = self.track(&request.path);
        ActionResponse::from_result(&result, || {
            format!("Successfully tracking {}", request.path.display())
        })
    }

    /// `untrack` rendered as an action response.
    pub fn untrack_action(&self, request: &TrackRequest) -> ActionResponse {
        let result = self.untrack(&request.path);
        ActionResponse::from_result(&result, || {
            format!("Stopped tracking {}", request.path.display())
        })
    }

    /// `manual_heartbeat` rendered as an action response.
    pub fn heartbeat_action(&self, request: &HeartbeatRequest) -> ActionResponse {
        let result = self.manual_heartbeat(&request.file);
        ActionResponse::from_result(&result, || {
            format!("Heartbeat queued for {}", request.file.display())
        })
    }
}
