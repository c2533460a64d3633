use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ac_bridge::broadcaster::Broadcaster;
use ac_bridge::event_bus::EventBus;
use ac_bridge::server::{self, BridgeState};
use ac_core::config::Config;
use ac_core::debouncer::Debouncer;
use ac_core::file_watcher::FileWatcher;
use ac_core::policy::PolicyStore;
use ac_core::session_log::SessionRecorder;
use ac_core::vcs::{open_backend, VcsPort};
use ac_harness::shutdown::{ShutdownGuard, ShutdownReason, ShutdownSignal};
use ac_intelligence::oracle::Oracle;
use ac_telemetry::metrics::MetricsCollector;
use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::orchestrator::Orchestrator;
use crate::state_machine::CycleState;

/// VCS calls one cycle can make: status, diff, add, commit, the rollback
/// reset and the log read when the outcome is published.
const CYCLE_VCS_CALLS: u32 = 6;
/// Oracle calls one cycle can make: judge and describe.
const CYCLE_ORACLE_CALLS: u32 = 2;
const DRAIN_SLACK: Duration = Duration::from_secs(2);

/// Longest a single cycle can take when every external call runs into its
/// timeout. Shutdown waits this long for components to drain.
pub fn drain_budget(command_timeout: Duration, oracle_timeout: Duration) -> Duration {
    command_timeout * CYCLE_VCS_CALLS + oracle_timeout * CYCLE_ORACLE_CALLS + DRAIN_SLACK
}

/// Wires watcher, debouncer, orchestrator, session log and notification
/// channel together for one watched repository, and tears them down in
/// order on shutdown.
pub struct Worker {
    root: PathBuf,
    config: Config,
    shutdown: ShutdownSignal,
    oracle: Option<Arc<Oracle>>,
    vcs: Option<Arc<dyn VcsPort>>,
}

impl Worker {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
            shutdown: ShutdownSignal::new(),
            oracle: None,
            vcs: None,
        }
    }

    /// Use this oracle instead of the one built from configuration.
    pub fn with_oracle(mut self, oracle: Arc<Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Use this backend instead of opening one at the root.
    pub fn with_vcs(mut self, vcs: Arc<dyn VcsPort>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run until the shutdown signal fires. Errors are startup failures, or a
    /// fatal shutdown such as the watched root disappearing.
    pub async fn run(self) -> Result<()> {
        let Worker {
            root,
            config,
            shutdown,
            oracle,
            vcs,
        } = self;

        let root = root
            .canonicalize()
            .with_context(|| format!("cannot resolve repository path {}", root.display()))?;
        anyhow::ensure!(root.is_dir(), "{} is not a directory", root.display());

        let kind = config.vcs.backend_kind()?;
        let vcs = vcs.unwrap_or_else(|| open_backend(kind, &root, &config.vcs.options()));
        let policy = Arc::new(PolicyStore::new(config.policy.initial_policy()));
        let oracle = oracle.unwrap_or_else(|| Arc::new(Oracle::from_config(&config.oracle)));
        let metrics = Arc::new(MetricsCollector::with_defaults());
        let broadcaster = Arc::new(Broadcaster::new(vcs.clone(), policy.clone(), EventBus::new()));

        let orchestrator = Orchestrator::new(vcs.clone(), oracle.clone(), policy.clone(), metrics.clone());
        orchestrator
            .bootstrap()
            .await
            .with_context(|| format!("failed to initialize {kind} repository at {}", root.display()))?;

        let recorder = Arc::new(
            SessionRecorder::create(&root, config.session.record_skips)
                .context("failed to create session log")?,
        );
        let orchestrator = Arc::new(
            orchestrator
                .with_recorder(recorder.clone())
                .with_broadcaster(broadcaster.clone()),
        );

        let mut components = 1;
        let bridge = if config.bridge.enabled {
            components += 1;
            Some(start_bridge(&config, broadcaster, metrics, shutdown.clone()).await?)
        } else {
            None
        };

        let trigger = orchestrator.trigger_handle();
        let debouncer = Debouncer::new(
            tokio::runtime::Handle::current(),
            config.watch.quiet_period(),
            Arc::new(move || trigger.trigger()),
        );
        let lost = shutdown.clone();
        let watcher = FileWatcher::spawn_with(
            &root,
            debouncer.clone(),
            Box::new(move |why| lost.trigger(ShutdownReason::Fatal(why))),
        )
        .with_context(|| format!("failed to watch {}", root.display()))?;

        let loop_task = {
            let orchestrator = orchestrator.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { orchestrator.run(shutdown).await })
        };

        info!(
            root = %root.display(),
            backend = %kind,
            debounce_ms = config.watch.debounce_ms,
            oracle_offline = oracle.is_offline(),
            "autocommit running"
        );

        shutdown.wait().await;
        info!(reason = ?shutdown.reason(), "stopping");

        if let Err(e) = tokio::task::spawn_blocking(move || watcher.stop()).await {
            warn!(error = %e, "watcher shutdown task failed");
        }
        debouncer.cancel();

        let drain_timeout = drain_budget(config.vcs.options().command_timeout, oracle.timeout());
        let mut signal = shutdown.clone();
        let drained = signal.wait_for_drain(components, drain_timeout).await;
        if !drained.is_complete() {
            if orchestrator.state() == CycleState::Committing {
                // Killing git mid-commit can leave a staged index behind.
                warn!(?drained, "commit still in flight, waiting for it to finish");
                if let Err(e) = loop_task.await {
                    warn!(error = %e, "orchestration loop ended abnormally");
                }
            } else {
                warn!(?drained, "shutting down with components still busy");
                loop_task.abort();
            }
        }
        if let Some(task) = bridge {
            join_logged("bridge", task).await;
        }

        let summarizer = oracle.summarizer(policy.detail_level_hint());
        if let Err(e) = recorder.finish(&summarizer).await {
            error!(error = %e, "could not write session summary");
        }
        info!(log = %recorder.path().display(), "session finished");

        match shutdown.reason() {
            Some(ShutdownReason::Fatal(why)) => Err(anyhow::anyhow!("stopped after fatal error: {why}")),
            _ => Ok(()),
        }
    }
}

async fn start_bridge(
    config: &Config,
    broadcaster: Arc<Broadcaster>,
    metrics: Arc<MetricsCollector>,
    shutdown: ShutdownSignal,
) -> Result<JoinHandle<()>> {
    let bind = format!("{}:{}", config.bridge.host, config.bridge.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind notification channel on {bind}"))?;

    let state = BridgeState::new(broadcaster, metrics, shutdown.clone())
        .with_allowed_origins(config.bridge.allowed_origins.clone());
    let frontend = config.bridge.frontend_dir.as_deref().map(Path::new);
    let app = server::router(state, frontend);

    let task = tokio::spawn(async move {
        let _guard = ShutdownGuard::new("bridge", shutdown.clone());
        if let Err(e) = server::serve(listener, app, shutdown).await {
            error!(error = %e, "notification channel failed");
        }
    });
    Ok(task)
}

async fn join_logged(component: &str, task: JoinHandle<()>) {
    match tokio::time::timeout(Duration::from_secs(5), task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(component, error = %e, "task ended abnormally"),
        Err(_) => warn!(component, "task did not stop in time"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_budget_covers_a_whole_cycle() {
        let budget = drain_budget(Duration::from_secs(30), Duration::from_secs(20));
        assert_eq!(budget, Duration::from_secs(6 * 30 + 2 * 20 + 2));
    }
}
