//! Enrichment of a changed file with project, branch, language and size.

use std::path::Path;

use crate::language::detect_language;
use crate::project::{git_branch, project_name};

/// Everything a heartbeat needs to know about a file beyond its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub project: String,
    pub branch: String,
    pub language: Option<String>,
    pub lines: Option<usize>,
}

impl FileMetadata {
    /// Resolves metadata for `path`.
    ///
    /// `project_override` replaces the resolved project name when set.
    pub fn resolve<'a>(
        path: &Path,
        tracked: impl IntoIterator<Item = &'a Path>,
        project_override: Option<&str>,
    ) -> Self {
        let project = project_override
            .filter(|p| !p.trim().is_empty())
            .map_or_else(|| project_name(path, tracked), String::from);

        Self {
            project,
            branch: git_branch(path),
            language: detect_language(path),
            lines: line_count(path),
        }
    }
}

/// Counts lines, decoding invalid UTF-8 permissively.
///
/// Returns `None` if the file cannot be read.
pub fn line_count(path: &Path) -> Option<usize> {
    let bytes = std::fs::read(path).ok()?;
    Some(String::from_utf8_lossy(&bytes).lines().count())
}
