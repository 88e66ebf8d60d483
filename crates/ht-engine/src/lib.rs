//! Activity tracking and heartbeat dispatch engine.
//!
//! Filesystem watchers, one per tracked directory, feed change events through
//! the classifier, fingerprinter and metadata resolver into a shared
//! last-write-wins queue. A background dispatcher drains the queue on a fixed
//! tick while the user is active and drops it once they go idle.
//!
//! # Thread Safety
//!
//! Watcher callbacks run on backend threads and call into the engine
//! synchronously. Fingerprints, the queue and the activity state share one
//! mutex so a compare-and-enqueue never loses an update. Directory add/remove
//! is serialized by the [`WatchRegistry`](registry::WatchRegistry).

pub mod clock;
pub mod contract;
pub mod dispatcher;
mod error;
pub mod registry;
pub mod settings;
mod state;
mod tracker;
pub mod watch;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{Dispatcher, IntervalTicker, ManualTicker, TickOutcome, TickTrigger, Ticker};
pub use error::{SettingsError, TrackError};
pub use registry::AddOutcome;
pub use settings::{MemorySettingsStore, Settings, SettingsStore};
pub use state::{ChangeOrigin, ChangeOutcome};
pub use tracker::{Tracker, TrackerBuilder};
pub use watch::{
    EventSink, FileEvent, FileEventKind, ManualBackend, NotifyBackend, WatchBackend, WatchError,
    WatchHandle,
};
