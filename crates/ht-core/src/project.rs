//! Project and git branch identity for a file.

use std::path::{Path, PathBuf};

const FALLBACK_BRANCH: &str = "main";
const HEAD_REF_PREFIX: &str = "ref: refs/heads/";

/// Resolves the project name for `path`.
///
/// The most specific (longest) tracked directory containing the file wins.
/// Outside every tracked directory, the file's parent directory name is used.
pub fn project_name<'a>(path: &Path, tracked: impl IntoIterator<Item = &'a Path>) -> String {
    let best = tracked
        .into_iter()
        .filter(|dir| path.starts_with(dir))
        .max_by_key(|dir| dir.components().count());

    best.and_then(base_name)
        .or_else(|| path.parent().and_then(base_name))
        .unwrap_or_else(|| "unknown".to_string())
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
}

/// Extract the branch name from the contents of `.git/HEAD`.
///
/// Returns `None` for a detached HEAD.
pub fn parse_head_ref(content: &str) -> Option<String> {
    let name = content.trim().strip_prefix(HEAD_REF_PREFIX)?.trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Resolves the git branch of the repository containing `path`.
///
/// Walks up from the file's directory and stops at the first `.git` found,
/// even if its `HEAD` is unreadable. Falls back to `"main"`.
pub fn git_branch(path: &Path) -> String {
    let start = if path.is_dir() { Some(path) } else { path.parent() };

    for dir in start.into_iter().flat_map(Path::ancestors) {
        let git = dir.join(".git");
        if !git.exists() {
            continue;
        }
        return head_file(&git)
            .and_then(|head| std::fs::read_to_string(head).ok())
            .and_then(|content| parse_head_ref(&content))
            .unwrap_or_else(|| FALLBACK_BRANCH.to_string());
    }

    FALLBACK_BRANCH.to_string()
}

/// Locates `HEAD` for a `.git` directory or a worktree `.git` file.
fn head_file(git: &Path) -> Option<PathBuf> {
    if git.is_dir() {
        return Some(git.join("HEAD"));
    }

    // Worktrees and submodules use a file containing `gitdir: <path>`.
    let pointer = std::fs::read_to_string(git).ok()?;
    let gitdir = pointer.trim().strip_prefix("gitdir:")?.trim();
    let gitdir = Path::new(gitdir);
    let gitdir = if gitdir.is_absolute() {
        gitdir.to_path_buf()
    } else {
        git.parent()?.join(gitdir)
    };
    Some(gitdir.join("HEAD"))
}
