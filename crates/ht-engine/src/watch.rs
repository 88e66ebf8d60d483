//! Filesystem watch capability.
//!
//! [`NotifyBackend`] watches directories with OS change notifications.
//! [`ManualBackend`] lets tests inject synthetic events.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors starting a watch.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

/// Kind of change observed on a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was created. Counts as a write.
    Created,
    /// File content or metadata changed.
    Modified,
}

/// A change to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileEventKind::Created,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileEventKind::Modified,
        }
    }
}

type Handler = dyn Fn(FileEvent) + Send + Sync;

/// Delivery end of a watch.
///
/// Closing the sink waits for any in-flight delivery to finish and drops all
/// later events, so nothing reaches the engine after a watch is stopped.
#[derive(Clone)]
pub struct EventSink {
    handler: Arc<Handler>,
    open: Arc<RwLock<bool>>,
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl EventSink {
    pub fn new(handler: impl Fn(FileEvent) + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            open: Arc::new(RwLock::new(true)),
        }
    }

    /// Hands the event to the engine unless the sink is closed.
    ///
    /// Returns whether the event was delivered.
    pub fn deliver(&self, event: FileEvent) -> bool {
        let open = self.open.read().unwrap_or_else(PoisonError::into_inner);
        if *open {
            (self.handler)(event);
        }
        *open
    }

    pub fn close(&self) {
        *self.open.write().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_open(&self) -> bool {
        *self.open.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A running watch. Stopping it releases the OS resources.
pub trait WatchHandle: Send {
    fn stop(self: Box<Self>);
}

/// Something that can watch a directory tree recursively.
pub trait WatchBackend: Send + Sync {
    fn start(&self, dir: &Path, sink: EventSink) -> Result<Box<dyn WatchHandle>, WatchError>;
}

/// Maps a notify event to the file events the engine cares about.
fn translate(event: notify::Event) -> Vec<FileEvent> {
    match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => {
            event.paths.into_iter().map(FileEvent::created).collect()
        }
        // Atomic saves land as a rename onto the real path.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.into_iter().last().map(FileEvent::modified).into_iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.into_iter().map(FileEvent::modified).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => Vec::new(),
        EventKind::Modify(_) => event.paths.into_iter().map(FileEvent::modified).collect(),
        _ => Vec::new(),
    }
}

/// OS notification backend (inotify, FSEvents, ReadDirectoryChangesW).
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

struct NotifyHandle {
    watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl WatchHandle for NotifyHandle {
    fn stop(mut self: Box<Self>) {
        if let Err(e) = self.watcher.unwatch(&self.dir) {
            debug!(dir = %self.dir.display(), "unwatch failed: {e}");
        }
    }
}

impl WatchBackend for NotifyBackend {
    fn start(&self, dir: &Path, sink: EventSink) -> Result<Box<dyn WatchHandle>, WatchError> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for file_event in translate(event) {
                        sink.deliver(file_event);
                    }
                }
                Err(e) => warn!("watch error: {e}"),
            }
        })?;

        watcher.watch(dir, RecursiveMode::Recursive)?;
        debug!(dir = %dir.display(), "started watching");

        Ok(Box::new(NotifyHandle {
            watcher,
            dir: dir.to_path_buf(),
        }))
    }
}

/// In-memory backend for tests: events are injected with [`ManualBackend::emit`].
#[derive(Debug, Default)]
pub struct ManualBackend {
    sinks: Arc<Mutex<HashMap<PathBuf, EventSink>>>,
    failing: Mutex<Vec<PathBuf>>,
}

struct ManualHandle {
    sinks: Arc<Mutex<HashMap<PathBuf, EventSink>>>,
    dir: PathBuf,
}

impl WatchHandle for ManualHandle {
    fn stop(self: Box<Self>) {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.dir);
    }
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `start` for `dir` fail.
    pub fn fail_next_start(&self, dir: impl Into<PathBuf>) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dir.into());
    }

    /// Directories with an active watch.
    pub fn watched(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        dirs.sort();
        dirs
    }

    /// Delivers `event` to the most specific watch covering its path.
    ///
    /// Returns `false` if no open watch covers the path.
    pub fn emit(&self, event: FileEvent) -> bool {
        let sink = {
            let sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
            sinks
                .iter()
                .filter(|(dir, _)| event.path.starts_with(dir))
                .max_by_key(|(dir, _)| dir.components().count())
                .map(|(_, sink)| sink.clone())
        };
        sink.is_some_and(|sink| sink.deliver(event))
    }
}

impl WatchBackend for ManualBackend {
    fn start(&self, dir: &Path, sink: EventSink) -> Result<Box<dyn WatchHandle>, WatchError> {
        {
            let mut failing = self.failing.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(idx) = failing.iter().position(|d| d == dir) {
                failing.remove(idx);
                return Err(WatchError::Backend(format!(
                    "refusing to watch {}",
                    dir.display()
                )));
            }
        }

        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dir.to_path_buf(), sink);

        Ok(Box::new(ManualHandle {
            sinks: Arc::clone(&self.sinks),
            dir: dir.to_path_buf(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use notify::event::{DataChange, MetadataKind, RemoveKind};

    fn notify_event(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_translate_maps_creates_and_modifies() {
        let created = translate(notify_event(EventKind::Create(CreateKind::File), &["/r/a.py"]));
        assert_eq!(created, vec![FileEvent::created("/r/a.py")]);

        let modified = translate(notify_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/a.py"],
        ));
        assert_eq!(modified, vec![FileEvent::modified("/r/a.py")]);

        let touched = translate(notify_event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            &["/r/a.py"],
        ));
        assert_eq!(touched, vec![FileEvent::modified("/r/a.py")]);
    }

    #[test]
    fn test_translate_follows_renames_to_destination() {
        let renamed = translate(notify_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/.a.py.swp", "/r/a.py"],
        ));
        assert_eq!(renamed, vec![FileEvent::modified("/r/a.py")]);

        let from = translate(notify_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/r/a.py"],
        ));
        assert!(from.is_empty());
    }

    #[test]
    fn test_translate_ignores_removals_and_directories() {
        let removed = notify_event(EventKind::Remove(RemoveKind::File), &["/r/a.py"]);
        assert!(translate(removed).is_empty());
        let folder = notify_event(EventKind::Create(CreateKind::Folder), &["/r/src"]);
        assert!(translate(folder).is_empty());
    }

    #[test]
    fn test_closed_sink_drops_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sink = EventSink::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sink.deliver(FileEvent::modified("/r/a.py")));
        sink.close();
        assert!(!sink.deliver(FileEvent::modified("/r/a.py")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manual_backend_routes_to_most_specific_watch() {
        let backend = ManualBackend::new();
        let outer = Arc::new(AtomicUsize::new(0));
        let inner = Arc::new(AtomicUsize::new(0));
        let (o, i) = (Arc::clone(&outer), Arc::clone(&inner));

        let _outer_handle = backend
            .start(Path::new("/a/proj"), EventSink::new(move |_| {
                o.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        let inner_handle = backend
            .start(Path::new("/a/proj/sub"), EventSink::new(move |_| {
                i.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert!(backend.emit(FileEvent::modified("/a/proj/sub/x.py")));
        assert!(backend.emit(FileEvent::modified("/a/proj/y.py")));
        assert!(!backend.emit(FileEvent::modified("/elsewhere/z.py")));
        assert_eq!(inner.load(Ordering::SeqCst), 1);
        assert_eq!(outer.load(Ordering::SeqCst), 1);

        inner_handle.stop();
        assert_eq!(backend.watched(), vec![PathBuf::from("/a/proj")]);
    }

    #[test]
    fn test_manual_backend_can_fail_start() {
        let backend = ManualBackend::new();
        backend.fail_next_start("/a/proj");
        assert!(backend.start(Path::new("/a/proj"), EventSink::new(|_| {})).is_err());
        assert!(backend.start(Path::new("/a/proj"), EventSink::new(|_| {})).is_ok());
    }
}
