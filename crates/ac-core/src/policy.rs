use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::types::Policy;

/// One inbound preference message. Each message sets exactly one field.
///
/// Accepted shapes are `{"commitFrequencyHint": "..."}` and
/// `{"detailLevelHint": "..."}`; anything else fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[serde(try_from = "Map<String, Value>")]
pub enum PreferenceUpdate {
    CommitFrequency {
        #[serde(rename = "commitFrequencyHint")]
        commit_frequency_hint: String,
    },
    DetailLevel {
        #[serde(rename = "detailLevelHint")]
        detail_level_hint: String,
    },
}

impl TryFrom<Map<String, Value>> for PreferenceUpdate {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!("expected exactly one field, got {}", map.len()));
        }
        let Some((key, value)) = map.into_iter().next() else {
            return Err("empty message".to_string());
        };
        let Value::String(text) = value else {
            return Err(format!("`{key}` must be a string"));
        };
        match key.as_str() {
            "commitFrequencyHint" => Ok(PreferenceUpdate::CommitFrequency {
                commit_frequency_hint: text,
            }),
            "detailLevelHint" => Ok(PreferenceUpdate::DetailLevel {
                detail_level_hint: text,
            }),
            other => Err(format!("unknown preference `{other}`")),
        }
    }
}

/// Live-mutable decision policy.
///
/// Each field sits behind its own lock: a writer replaces a whole field and
/// a reader clones a whole field, so no field is ever observed half-written.
/// The two fields are independent and a snapshot may mix values written by
/// different messages.
#[derive(Debug)]
pub struct PolicyStore {
    commit_frequency_hint: RwLock<String>,
    detail_level_hint: RwLock<String>,
}

impl PolicyStore {
    pub fn new(initial: Policy) -> Self {
        Self {
            commit_frequency_hint: RwLock::new(initial.commit_frequency_hint),
            detail_level_hint: RwLock::new(initial.detail_level_hint),
        }
    }

    /// A fully-formed copy of the current policy.
    pub fn snapshot(&self) -> Policy {
        Policy {
            commit_frequency_hint: self.commit_frequency_hint(),
            detail_level_hint: self.detail_level_hint(),
        }
    }

    pub fn commit_frequency_hint(&self) -> String {
        self.commit_frequency_hint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn detail_level_hint(&self) -> String {
        self.detail_level_hint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_commit_frequency_hint(&self, text: impl Into<String>) {
        let text = text.into();
        info!(hint = %text, "commit frequency preference updated");
        *self
            .commit_frequency_hint
            .write()
            .unwrap_or_else(PoisonError::into_inner) = text;
    }

    pub fn set_detail_level_hint(&self, text: impl Into<String>) {
        let text = text.into();
        info!(hint = %text, "detail level preference updated");
        *self
            .detail_level_hint
            .write()
            .unwrap_or_else(PoisonError::into_inner) = text;
    }

    pub fn apply(&self, update: PreferenceUpdate) {
        match update {
            PreferenceUpdate::CommitFrequency {
                commit_frequency_hint,
            } => self.set_commit_frequency_hint(commit_frequency_hint),
            PreferenceUpdate::DetailLevel { detail_level_hint } => {
                self.set_detail_level_hint(detail_level_hint)
            }
        }
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(Policy::default())
    }
}
