use ac_core::types::{CommitOutcome, Policy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outbound message sent to every subscriber.
///
/// ```json
/// {"path": "/work/repo", "log": "commit 1a2b...", "policy": {"commitFrequencyHint": "...", "detailLevelHint": "..."}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Absolute path of the watched repository.
    pub path: String,
    /// Current backend history, empty when it could not be read.
    pub log: String,
    pub policy: Policy,
}

/// Body of `GET /api/state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub path: String,
    pub backend: String,
    pub policy: Policy,
    pub subscribers: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<CommitOutcome>,
}
