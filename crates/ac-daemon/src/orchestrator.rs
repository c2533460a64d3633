use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use ac_bridge::broadcaster::Broadcaster;
use ac_core::policy::PolicyStore;
use ac_core::session_log::SessionRecorder;
use ac_core::types::{ChangeReport, CommitOutcome};
use ac_core::vcs::VcsPort;
use ac_harness::shutdown::{ShutdownGuard, ShutdownSignal};
use ac_intelligence::oracle::{Oracle, OracleError, Verdict};
use ac_telemetry::metrics::{
    MetricsCollector, COMMITS_TOTAL, COMMIT_FAILURES_TOTAL, CYCLES_TOTAL, CYCLE_DURATION_SECONDS,
    ORACLE_FAILURES_TOTAL, SKIPS_TOTAL,
};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::state_machine::{CycleEvent, CycleState, CycleStateMachine};

// ---------------------------------------------------------------------------
// TriggerHandle
// ---------------------------------------------------------------------------

/// Cheap handle the debouncer uses to request a cycle.
///
/// Backed by a one-permit [`Notify`]: any number of triggers arriving while a
/// cycle runs collapse into exactly one follow-up cycle.
#[derive(Clone, Debug, Default)]
pub struct TriggerHandle {
    notify: Arc<Notify>,
}

impl TriggerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs commit cycles one at a time: inspect, judge, describe, commit.
///
/// Every failure inside a cycle is handled at the cycle boundary; nothing
/// propagates out of [`run_cycle`](Self::run_cycle).
pub struct Orchestrator {
    vcs: Arc<dyn VcsPort>,
    oracle: Arc<Oracle>,
    policy: Arc<PolicyStore>,
    metrics: Arc<MetricsCollector>,
    recorder: Option<Arc<SessionRecorder>>,
    broadcaster: Option<Arc<Broadcaster>>,
    state: Mutex<CycleStateMachine>,
    trigger: TriggerHandle,
}

impl Orchestrator {
    pub fn new(
        vcs: Arc<dyn VcsPort>,
        oracle: Arc<Oracle>,
        policy: Arc<PolicyStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            vcs,
            oracle,
            policy,
            metrics,
            recorder: None,
            broadcaster: None,
            state: Mutex::new(CycleStateMachine::new()),
            trigger: TriggerHandle::new(),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<SessionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn trigger_handle(&self) -> TriggerHandle {
        self.trigger.clone()
    }

    pub fn state(&self) -> CycleState {
        self.machine().state()
    }

    fn machine(&self) -> std::sync::MutexGuard<'_, CycleStateMachine> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, event: CycleEvent) {
        self.machine().advance(event);
    }

    /// Create the repository if the root is not one yet.
    pub async fn bootstrap(&self) -> ac_core::vcs::Result<()> {
        if self.vcs.is_valid_repository() {
            debug!(root = %self.vcs.root().display(), "repository present");
            return Ok(());
        }
        info!(
            root = %self.vcs.root().display(),
            backend = %self.vcs.kind(),
            "no repository found, initializing"
        );
        self.vcs.initialize_repository().await
    }

    /// Process triggers until shutdown. Shutdown is observed between cycles,
    /// so a cycle in flight always finishes.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        let _guard = ShutdownGuard::new("orchestrator", shutdown.clone());
        info!("orchestration loop started");

        loop {
            tokio::select! {
                _ = self.trigger.notified() => {}
                _ = shutdown.wait() => break,
            }
            if shutdown.is_shutting_down() {
                break;
            }
            self.run_cycle().await;
        }

        info!("orchestration loop stopped");
    }

    /// One full cycle. Returns the outcome when a decision was reached, or
    /// `None` when there was nothing to decide on.
    pub async fn run_cycle(&self) -> Option<CommitOutcome> {
        let start = Instant::now();
        self.machine().reset();
        self.advance(CycleEvent::Settled);
        self.metrics.increment_counter(CYCLES_TOTAL, &[]);

        let outcome = self.evaluate().await;

        self.metrics
            .record_histogram(CYCLE_DURATION_SECONDS, start.elapsed().as_secs_f64());

        if let Some(outcome) = &outcome {
            self.publish(outcome).await;
        }
        outcome
    }

    async fn evaluate(&self) -> Option<CommitOutcome> {
        let report = match self.vcs.inspect().await {
            Ok(report) => report,
            Err(e) => {
                warn!(root = %self.vcs.root().display(), error = %e, "could not inspect working copy");
                self.advance(CycleEvent::Declined);
                return None;
            }
        };

        if report.is_empty() {
            debug!("nothing changed");
            self.advance(CycleEvent::Declined);
            return None;
        }

        let policy = self.policy.snapshot();
        let verdict = match self.oracle.judge(&report, &policy.commit_frequency_hint).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "judgment failed, treating as wait");
                self.metrics
                    .increment_counter(ORACLE_FAILURES_TOTAL, &[("call", "judge")]);
                Verdict::Wait
            }
        };

        if !verdict.is_commit() {
            info!(affected = report.affected_count(), "oracle says wait");
            self.metrics.increment_counter(SKIPS_TOTAL, &[]);
            self.advance(CycleEvent::Declined);
            return Some(CommitOutcome::skipped(
                "oracle declined to commit",
                report.affected_count(),
            ));
        }

        self.advance(CycleEvent::Approved);
        let message = self.describe(&report, &policy.detail_level_hint).await;
        let outcome = match self.vcs.commit(&message).await {
            Ok(()) => {
                info!(affected = report.affected_count(), message = %first_line(&message), "committed");
                self.metrics.increment_counter(COMMITS_TOTAL, &[]);
                CommitOutcome::committed(message, report.affected_count())
            }
            Err(e) => {
                error!(root = %self.vcs.root().display(), error = %e, "commit failed");
                self.metrics.increment_counter(COMMIT_FAILURES_TOTAL, &[]);
                CommitOutcome::failed(message, report.affected_count(), e.to_string())
            }
        };
        self.advance(CycleEvent::Finished);
        Some(outcome)
    }

    async fn describe(&self, report: &ChangeReport, detail_level_hint: &str) -> String {
        match self.oracle.describe(report, detail_level_hint).await {
            Ok(message) => message,
            Err(OracleError::Offline) => report.default_message(),
            Err(e) => {
                warn!(error = %e, "description failed, using default message");
                self.metrics
                    .increment_counter(ORACLE_FAILURES_TOTAL, &[("call", "describe")]);
                report.default_message()
            }
        }
    }

    async fn publish(&self, outcome: &CommitOutcome) {
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record(outcome) {
                warn!(error = %e, "could not record outcome");
            }
        }
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.record_outcome(outcome).await;
        }
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}
