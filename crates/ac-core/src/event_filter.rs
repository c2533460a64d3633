//! Relevance predicate for raw filesystem events.

use std::path::{Component, Path};

use crate::types::RawEvent;

/// Directory segments whose contents never trigger a commit cycle.
pub const IGNORED_SEGMENTS: &[&str] = &[".git", ".jj", "__pycache__", SESSION_LOG_DIR];

/// Editor swap files, backups and build artifacts.
pub const IGNORED_SUFFIXES: &[&str] = &[".swp", ".swx", "~", ".tmp", ".temp", ".pyc"];

/// Reserved directory (relative to the watched root) holding session logs.
pub const SESSION_LOG_DIR: &str = ".commit_logs";

/// Returns `true` when `event` should start or restart the debounce timer.
///
/// Pure: looks only at the event itself, never at the filesystem.
pub fn is_relevant(event: &RawEvent) -> bool {
    if event.is_directory {
        return false;
    }

    let path = Path::new(&event.path);
    let in_ignored_dir = path.components().any(|c| match c {
        Component::Normal(seg) => seg
            .to_str()
            .is_some_and(|s| IGNORED_SEGMENTS.contains(&s)),
        _ => false,
    });
    if in_ignored_dir {
        return false;
    }

    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    if path.extension().is_none() {
        return false;
    }
    !IGNORED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
