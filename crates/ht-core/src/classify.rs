//! Eligibility filter for tracked files.

use std::path::{Component, Path};

/// Files larger than this are never tracked (2 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Binary, media, archive and office extensions that never produce heartbeats.
const SKIPPED_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "obj", "o", // binaries
    "jpg", "jpeg", "png", "gif", "bmp", "ico", "svg", // images
    "mp3", "mp4", "avi", "mov", "wav", "flac", // media
    "zip", "tar", "gz", "7z", "rar", // archives
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", // documents
];

/// Decides whether a path is eligible for tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    max_file_size: u64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl Classifier {
    pub const fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub const fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Returns `true` if the file should produce heartbeats.
    ///
    /// Fails closed: anything that cannot be stat'ed is rejected.
    pub fn should_track(&self, path: &Path) -> bool {
        if is_excluded_path(path) {
            return false;
        }

        match std::fs::metadata(path) {
            Ok(meta) => meta.is_file() && meta.len() <= self.max_file_size,
            Err(_) => false,
        }
    }
}

/// Path-only part of the classifier: dot-prefixed segments and skipped
/// extensions. Does not touch the filesystem.
pub fn is_excluded_path(path: &Path) -> bool {
    has_hidden_component(path) || has_skipped_extension(path)
}

/// True if any normal component of the path starts with `.`.
pub fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

fn has_skipped_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SKIPPED_EXTENSIONS.contains(&ext.as_str()))
}
