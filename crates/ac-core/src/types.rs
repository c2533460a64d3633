use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RawEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawEventKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for RawEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RawEventKind::Created => "created",
            RawEventKind::Modified => "modified",
            RawEventKind::Deleted => "deleted",
        };
        write!(f, "{}", label)
    }
}

/// A single filesystem mutation as delivered by the watch source.
///
/// `is_directory` is resolved by the watch adapter so that relevance
/// filtering never has to touch the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub path: String,
    #[serde(default)]
    pub is_directory: bool,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            is_directory: false,
        }
    }

    pub fn created(path: impl Into<String>) -> Self {
        Self::new(RawEventKind::Created, path)
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self::new(RawEventKind::Modified, path)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(RawEventKind::Deleted, path)
    }

    pub fn directory(mut self) -> Self {
        self.is_directory = true;
        self
    }
}

// ---------------------------------------------------------------------------
// ChangeReport
// ---------------------------------------------------------------------------

/// What the repository looks like right now, built fresh for every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    affected_count: usize,
    summary_text: String,
    detail_text: String,
}

impl ChangeReport {
    /// Build a report from the backend's summary and diff output.
    ///
    /// The affected count is the number of non-blank summary lines, one per
    /// changed path.
    pub fn new(summary_text: impl Into<String>, detail_text: impl Into<String>) -> Self {
        let summary_text = summary_text.into();
        let affected_count = summary_text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count();
        Self {
            affected_count,
            summary_text,
            detail_text: detail_text.into(),
        }
    }

    pub fn affected_count(&self) -> usize {
        self.affected_count
    }

    pub fn summary_text(&self) -> &str {
        &self.summary_text
    }

    pub fn detail_text(&self) -> &str {
        &self.detail_text
    }

    pub fn is_empty(&self) -> bool {
        self.affected_count == 0
    }

    /// Deterministic commit message used when no description is available.
    pub fn default_message(&self) -> String {
        let noun = if self.affected_count == 1 { "path" } else { "paths" };
        let mut msg = format!("Auto-commit: {} {noun} changed", self.affected_count);
        let summary = self.summary_text.trim_end();
        if !summary.is_empty() {
            msg.push_str("\n\n");
            msg.push_str(summary);
        }
        msg
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub const DEFAULT_COMMIT_FREQUENCY_HINT: &str =
    "Commit whenever a coherent, self-contained piece of work looks finished. \
     Prefer committing before large deletions.";

pub const DEFAULT_DETAIL_LEVEL_HINT: &str =
    "Write a short imperative subject line, optionally followed by a few bullet points.";

/// The live decision policy shared with remote observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub commit_frequency_hint: String,
    pub detail_level_hint: String,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            commit_frequency_hint: DEFAULT_COMMIT_FREQUENCY_HINT.to_string(),
            detail_level_hint: DEFAULT_DETAIL_LEVEL_HINT.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// CommitOutcome
// ---------------------------------------------------------------------------

/// Result of one orchestration cycle that reached a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub id: Uuid,
    pub committed: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub affected_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommitOutcome {
    pub fn committed(message: impl Into<String>, affected_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            committed: true,
            message: message.into(),
            timestamp: Utc::now(),
            affected_count,
            error: None,
        }
    }

    pub fn skipped(reason: impl Into<String>, affected_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            committed: false,
            message: reason.into(),
            timestamp: Utc::now(),
            affected_count,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, affected_count: usize, error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            committed: false,
            message: message.into(),
            timestamp: Utc::now(),
            affected_count,
            error: Some(error.into()),
        }
    }

    /// Single-line rendering used for the session log.
    pub fn log_line(&self) -> String {
        match (&self.error, self.committed) {
            (_, true) => format!("committed ({} paths): {}", self.affected_count, self.message),
            (Some(err), false) => format!(
                "commit failed ({} paths): {} [{}]",
                self.affected_count, self.message, err
            ),
            (None, false) => format!("skipped ({} paths): {}", self.affected_count, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_report_counts_non_blank_lines() {
        let report = ChangeReport::new("?? notes.txt\n M src/lib.rs\n\n", "diff");
        assert_eq!(report.affected_count(), 2);
        assert!(!report.is_empty());
    }

    #[test]
    fn empty_summary_is_empty_report() {
        let report = ChangeReport::new("", "");
        assert_eq!(report.affected_count(), 0);
        assert!(report.is_empty());
    }

    #[test]
    fn default_message_includes_summary() {
        let report = ChangeReport::new("?? notes.txt\n", "");
        let msg = report.default_message();
        assert!(msg.starts_with("Auto-commit: 1 path changed"));
        assert!(msg.contains("?? notes.txt"));
    }

    #[test]
    fn policy_serializes_camel_case() {
        let json = serde_json::to_value(Policy::default()).unwrap();
        assert!(json.get("commitFrequencyHint").is_some());
        assert!(json.get("detailLevelHint").is_some());
    }

    #[test]
    fn outcome_log_lines() {
        let ok = CommitOutcome::committed("Add notes", 1);
        assert!(ok.log_line().starts_with("committed"));
        let skip = CommitOutcome::skipped("not yet", 3);
        assert!(skip.log_line().starts_with("skipped"));
        let failed = CommitOutcome::failed("Add notes", 1, "hook rejected");
        assert!(failed.log_line().contains("hook rejected"));
        assert!(!failed.committed);
    }
}
