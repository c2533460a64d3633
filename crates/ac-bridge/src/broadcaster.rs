use std::sync::{Arc, Mutex, PoisonError};

use ac_core::policy::{PolicyStore, PreferenceUpdate};
use ac_core::types::CommitOutcome;
use ac_core::vcs::VcsPort;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::event_bus::EventBus;
use crate::protocol::{Notification, StateSnapshot};

/// Builds notifications from live state and pushes them to every subscriber.
///
/// The orchestration loop calls [`record_outcome`](Self::record_outcome)
/// after each cycle; the WebSocket handlers call [`broadcast`](Self::broadcast)
/// on connect and [`apply_preference`](Self::apply_preference) for inbound
/// messages.
pub struct Broadcaster {
    repo_path: String,
    vcs: Arc<dyn VcsPort>,
    policy: Arc<PolicyStore>,
    bus: EventBus,
    started_at: DateTime<Utc>,
    last_outcome: Mutex<Option<CommitOutcome>>,
}

impl Broadcaster {
    pub fn new(vcs: Arc<dyn VcsPort>, policy: Arc<PolicyStore>, bus: EventBus) -> Self {
        Self {
            repo_path: vcs.root().display().to_string(),
            vcs,
            policy,
            bus,
            started_at: Utc::now(),
            last_outcome: Mutex::new(None),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    /// Current path, history and policy. A history read failure degrades to
    /// an empty log rather than failing the notification.
    pub async fn snapshot(&self) -> Notification {
        let log = match self.vcs.log().await {
            Ok(log) => log,
            Err(e) => {
                warn!(repo = %self.repo_path, error = %e, "could not read history for notification");
                String::new()
            }
        };
        Notification {
            path: self.repo_path.clone(),
            log,
            policy: self.policy.snapshot(),
        }
    }

    /// Send a fresh snapshot to every subscriber.
    pub async fn broadcast(&self) {
        let note = self.snapshot().await;
        let delivered = self.bus.publish(note);
        debug!(delivered, "notification broadcast");
    }

    pub async fn record_outcome(&self, outcome: &CommitOutcome) {
        *self
            .last_outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome.clone());
        self.broadcast().await;
    }

    pub async fn apply_preference(&self, update: PreferenceUpdate) {
        self.policy.apply(update);
        self.broadcast().await;
    }

    pub fn last_outcome(&self) -> Option<CommitOutcome> {
        self.last_outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> StateSnapshot {
        StateSnapshot {
            path: self.repo_path.clone(),
            backend: self.vcs.kind().to_string(),
            policy: self.policy.snapshot(),
            subscribers: self.bus.subscriber_count(),
            started_at: self.started_at,
            last_outcome: self.last_outcome(),
        }
    }
}
