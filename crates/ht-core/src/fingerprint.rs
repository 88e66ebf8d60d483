//! Content fingerprints used to detect no-op writes.
//!
//! The hash is only compared for equality, never used for security.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::classify::{Classifier, has_hidden_component};

/// Hash of a file's full contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

/// Reads the whole file and hashes it.
pub fn fingerprint(path: &Path) -> std::io::Result<ContentHash> {
    let content = std::fs::read(path)?;
    Ok(ContentHash::of(&content))
}

/// Last observed content hash per file.
#[derive(Debug, Default)]
pub struct FingerprintStore {
    hashes: HashMap<PathBuf, ContentHash>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&ContentHash> {
        self.hashes.get(path)
    }

    /// True if there is no prior hash, the prior hash differs, or `forced`.
    pub fn has_changed(&self, path: &Path, hash: &ContentHash, forced: bool) -> bool {
        forced || self.hashes.get(path) != Some(hash)
    }

    /// Stores `hash` as the new baseline for `path`.
    pub fn record(&mut self, path: impl Into<PathBuf>, hash: ContentHash) {
        self.hashes.insert(path.into(), hash);
    }

    /// Stores `hash` only if `path` has no baseline yet. Returns whether it
    /// was stored.
    pub fn record_if_absent(&mut self, path: impl Into<PathBuf>, hash: ContentHash) -> bool {
        match self.hashes.entry(path.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(hash);
                true
            }
        }
    }

    /// Drops every entry under `dir` for which `keep` returns false.
    ///
    /// Returns the number of entries removed.
    pub fn forget_under(&mut self, dir: &Path, keep: impl Fn(&Path) -> bool) -> usize {
        let before = self.hashes.len();
        self.hashes
            .retain(|path, _| !path.starts_with(dir) || keep(path));
        before - self.hashes.len()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Walks `dir` recursively and fingerprints every file the classifier accepts.
///
/// Dot-prefixed directories are pruned rather than descended into. Files that
/// fail to read are skipped.
pub fn scan_directory(dir: &Path, classifier: &Classifier) -> Vec<(PathBuf, ContentHash)> {
    let candidates: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !has_hidden_component(Path::new(entry.file_name()))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();

    candidates
        .into_par_iter()
        .filter(|path| classifier.should_track(path))
        .filter_map(|path| match fingerprint(&path) {
            Ok(hash) => Some((path, hash)),
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    %err,
                    "skipping unreadable file during scan"
                );
                None
            }
        })
        .collect()
}
