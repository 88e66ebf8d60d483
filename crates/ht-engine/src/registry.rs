//! Tracked directories and their watchers.
//!
//! Each tracked directory owns exactly one watch. Removing a directory stops
//! only its own watch; other directories keep running undisturbed.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use ht_core::scan_directory;
use tracing::{debug, info};

use crate::error::TrackError;
use crate::state::Shared;
use crate::watch::{EventSink, WatchBackend, WatchHandle};

/// Result of a successful `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new watch was started; `seeded` files were fingerprinted.
    Added { seeded: usize },
    /// The directory was already tracked; nothing changed.
    AlreadyTracked,
}

struct ActiveWatch {
    handle: Box<dyn WatchHandle>,
    sink: EventSink,
}

impl ActiveWatch {
    /// Blocks further deliveries, waits for an in-flight one, then releases
    /// the backend watch.
    fn stop(self) {
        self.sink.close();
        self.handle.stop();
    }
}

/// Owns one watcher per tracked directory.
pub struct WatchRegistry {
    backend: Arc<dyn WatchBackend>,
    watches: Mutex<BTreeMap<PathBuf, ActiveWatch>>,
}

impl fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let watches = self.watches.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("WatchRegistry")
            .field("watches", &watches.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl WatchRegistry {
    pub(crate) fn new(backend: Arc<dyn WatchBackend>) -> Self {
        Self {
            backend,
            watches: Mutex::new(BTreeMap::new()),
        }
    }

    /// Starts tracking `dir` and seeds fingerprints for every eligible file.
    pub(crate) fn add(&self, shared: &Arc<Shared>, dir: &Path) -> Result<AddOutcome, TrackError> {
        let dir = normalize(dir)?;
        let mut watches = self.watches.lock().unwrap_or_else(PoisonError::into_inner);

        if watches.contains_key(&dir) {
            debug!(dir = %dir.display(), "already tracked");
            return Ok(AddOutcome::AlreadyTracked);
        }
        if !dir.exists() {
            return Err(TrackError::NotFound {
                what: "directory",
                path: dir,
            });
        }
        if !dir.is_dir() {
            return Err(TrackError::Validation(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let weak: Weak<Shared> = Arc::downgrade(shared);
        let sink = EventSink::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_event(event);
            }
        });
        let handle = self
            .backend
            .start(&dir, sink.clone())
            .map_err(|source| TrackError::Watch {
                path: dir.clone(),
                source,
            })?;

        shared.insert_tracked(dir.clone());
        watches.insert(dir.clone(), ActiveWatch { handle, sink });

        // The watch is already live; events handled during the scan carry
        // newer content than the scan read and must keep their baseline.
        let baseline = scan_directory(&dir, &shared.classifier());
        let seeded = {
            let mut state = shared.lock();
            baseline
                .into_iter()
                .filter(|(path, hash)| state.fingerprints.record_if_absent(path, *hash))
                .count()
        };

        info!(dir = %dir.display(), seeded, "tracking directory");
        Ok(AddOutcome::Added { seeded })
    }

    /// Stops tracking `dir`.
    ///
    /// Fingerprints under `dir` are forgotten unless another tracked
    /// directory still covers them.
    pub(crate) fn remove(&self, shared: &Shared, dir: &Path) -> Result<(), TrackError> {
        let dir = normalize(dir)?;
        let mut watches = self.watches.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(active) = watches.remove(&dir) else {
            return Err(TrackError::NotFound {
                what: "tracked directory",
                path: dir,
            });
        };
        active.stop();
        shared.remove_tracked(&dir);

        let remaining: Vec<PathBuf> = watches.keys().cloned().collect();
        let forgotten = shared
            .lock()
            .fingerprints
            .forget_under(&dir, |path| remaining.iter().any(|d| path.starts_with(d)));

        info!(dir = %dir.display(), forgotten, "stopped tracking directory");
        Ok(())
    }

    /// Stops every watch. No events are delivered once this returns.
    pub(crate) fn shutdown(&self, shared: &Shared) {
        let watches =
            std::mem::take(&mut *self.watches.lock().unwrap_or_else(PoisonError::into_inner));
        for (dir, active) in watches {
            active.stop();
            shared.remove_tracked(&dir);
            debug!(dir = %dir.display(), "watch stopped");
        }
    }

    pub fn len(&self) -> usize {
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Makes `path` absolute and removes `.`/`..` components lexically.
///
/// Symlinks are not resolved, so a path is tracked under the name it was
/// given.
pub fn normalize(path: &Path) -> Result<PathBuf, TrackError> {
    if path.as_os_str().is_empty() {
        return Err(TrackError::Validation("path is required".to_string()));
    }
    let absolute = std::path::absolute(path)
        .map_err(|e| TrackError::Validation(format!("invalid path {}: {e}", path.display())))?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use crate::clock::SystemClock;
    use crate::settings::Settings;
    use crate::watch::{FileEvent, ManualBackend};

    fn fixture() -> (tempfile::TempDir, Arc<Shared>, Arc<ManualBackend>, WatchRegistry) {
        let dir = tempfile::Builder::new().prefix("ht-registry").tempdir().unwrap();
        let shared = Arc::new(Shared::new(Settings::default(), Arc::new(SystemClock)));
        let backend = Arc::new(ManualBackend::new());
        let registry = WatchRegistry::new(backend.clone());
        (dir, shared, backend, registry)
    }

    #[test]
    fn test_normalize_resolves_dots() {
        let path = normalize(Path::new("/a/b/../c/./d")).unwrap();
        assert_eq!(path, PathBuf::from("/a/c/d"));
        assert!(normalize(Path::new("relative")).unwrap().is_absolute());
        assert!(matches!(
            normalize(Path::new("")),
            Err(TrackError::Validation(_))
        ));
    }

    #[test]
    fn test_add_seeds_fingerprints_without_heartbeats() {
        let (dir, shared, backend, registry) = fixture();
        fs::write(dir.path().join("a.py"), "x=1").unwrap();
        fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();

        let outcome = registry.add(&shared, dir.path()).unwrap();
        assert_eq!(outcome, AddOutcome::Added { seeded: 2 });
        assert_eq!(shared.lock().fingerprints.len(), 2);
        assert!(shared.lock().queue.is_empty());
        assert_eq!(backend.watched(), vec![dir.path().to_path_buf()]);
        assert_eq!(shared.tracked(), vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn test_add_keeps_baselines_recorded_during_scan() {
        let (dir, shared, _backend, registry) = fixture();
        let file = dir.path().join("a.py");
        fs::write(&file, "x=1").unwrap();
        // A watcher event that landed before the scan reached this file.
        let newer = ht_core::ContentHash::of(b"x=2");
        shared.lock().fingerprints.record(&file, newer);

        let outcome = registry.add(&shared, dir.path()).unwrap();
        assert_eq!(outcome, AddOutcome::Added { seeded: 0 });
        assert_eq!(shared.lock().fingerprints.get(&file), Some(&newer));
    }

    #[test]
    fn test_add_twice_is_noop_success() {
        let (dir, shared, _backend, registry) = fixture();
        registry.add(&shared, dir.path()).unwrap();
        let again = registry.add(&shared, &dir.path().join("sub/..")).unwrap();
        assert_eq!(again, AddOutcome::AlreadyTracked);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_missing_directory_fails() {
        let (dir, shared, _backend, registry) = fixture();
        let err = registry.add(&shared, &dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, TrackError::NotFound { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_file_is_validation_error() {
        let (dir, shared, _backend, registry) = fixture();
        let file = dir.path().join("a.py");
        fs::write(&file, "x=1").unwrap();
        assert!(matches!(
            registry.add(&shared, &file),
            Err(TrackError::Validation(_))
        ));
    }

    #[test]
    fn test_watch_failure_leaves_directory_untracked() {
        let (dir, shared, backend, registry) = fixture();
        backend.fail_next_start(dir.path());

        let err = registry.add(&shared, dir.path()).unwrap_err();
        assert!(matches!(err, TrackError::Watch { .. }));
        assert!(shared.tracked().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_stops_only_that_watch() {
        let (dir, shared, backend, registry) = fixture();
        let one = dir.path().join("one");
        let two = dir.path().join("two");
        fs::create_dir_all(&one).unwrap();
        fs::create_dir_all(&two).unwrap();
        fs::write(one.join("a.py"), "x=1").unwrap();
        fs::write(two.join("b.py"), "y=1").unwrap();
        registry.add(&shared, &one).unwrap();
        registry.add(&shared, &two).unwrap();

        registry.remove(&shared, &one).unwrap();

        assert_eq!(backend.watched(), vec![two.clone()]);
        assert_eq!(shared.tracked(), vec![two.clone()]);
        let state = shared.lock();
        assert!(state.fingerprints.get(&one.join("a.py")).is_none());
        assert!(state.fingerprints.get(&two.join("b.py")).is_some());
    }

    #[test]
    fn test_remove_nested_keeps_fingerprints_covered_by_parent() {
        let (dir, shared, _backend, registry) = fixture();
        let sub = dir.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("x.py"), "x=1").unwrap();
        registry.add(&shared, dir.path()).unwrap();
        registry.add(&shared, &sub).unwrap();

        registry.remove(&shared, &sub).unwrap();
        assert!(shared.lock().fingerprints.get(&sub.join("x.py")).is_some());
    }

    #[test]
    fn test_remove_untracked_is_not_found() {
        let (dir, shared, _backend, registry) = fixture();
        assert!(matches!(
            registry.remove(&shared, dir.path()),
            Err(TrackError::NotFound { .. })
        ));
    }

    #[test]
    fn test_removed_watch_delivers_nothing() {
        let (dir, shared, backend, registry) = fixture();
        registry.add(&shared, dir.path()).unwrap();
        registry.remove(&shared, dir.path()).unwrap();

        fs::write(dir.path().join("late.py"), "x=1").unwrap();
        assert!(!backend.emit(FileEvent::created(dir.path().join("late.py"))));
        assert!(shared.lock().queue.is_empty());
        assert!(shared.lock().activity.last_activity().is_none());
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let (dir, shared, backend, registry) = fixture();
        registry.add(&shared, dir.path()).unwrap();
        registry.shutdown(&shared);
        assert!(backend.watched().is_empty());
        assert!(registry.is_empty());
        assert!(shared.tracked().is_empty());
    }
}
