use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::event_filter::is_relevant;
use crate::types::RawEvent;

/// Invoked once per settled burst, on the timer task.
pub type SettledCallback = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// DebounceState
// ---------------------------------------------------------------------------

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct DebounceState {
    quiet_period: Duration,
    /// Bumped every time a timer is installed. A timer only settles if its
    /// generation is still the pending one when it takes the lock.
    generation: u64,
    pending: Option<PendingTimer>,
}

struct Inner {
    state: Mutex<DebounceState>,
    on_settled: SettledCallback,
    runtime: Handle,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, generation: u64) {
        let settled = {
            let mut state = self.lock_state();
            match &state.pending {
                Some(timer) if timer.generation == generation => {
                    state.pending = None;
                    true
                }
                _ => false,
            }
        };

        if settled {
            debug!(generation, "debounce period over, change settled");
            (self.on_settled)();
        } else {
            trace!(generation, "stale debounce timer woke up, ignoring");
        }
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Coalesces bursts of relevant filesystem events into one settled signal.
///
/// Every relevant event cancels the pending timer and installs a new one for
/// the quiet period. Cancel-and-replace and fire-and-clear happen under the
/// same mutex, so a burst produces exactly one `on_settled` call, timed one
/// quiet period after its last event.
///
/// Cloning is cheap and clones share the same timer.
#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<Inner>,
}

impl Debouncer {
    /// Create a debouncer whose timers run on `runtime`.
    ///
    /// `on_event` may be called from any thread, including threads outside
    /// the runtime.
    pub fn new(runtime: Handle, quiet_period: Duration, on_settled: SettledCallback) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DebounceState {
                    quiet_period,
                    generation: 0,
                    pending: None,
                }),
                on_settled,
                runtime,
            }),
        }
    }

    /// Change the quiet period. Applies to timers started after this call.
    pub fn configure(&self, quiet_period: Duration) {
        self.inner.lock_state().quiet_period = quiet_period;
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.lock_state().quiet_period
    }

    /// Feed one raw event. Returns `true` if the event was relevant and the
    /// timer was (re)started.
    pub fn on_event(&self, event: &RawEvent) -> bool {
        if !is_relevant(event) {
            trace!(path = %event.path, kind = %event.kind, "ignoring irrelevant event");
            return false;
        }

        let mut state = self.inner.lock_state();
        if let Some(previous) = state.pending.take() {
            previous.handle.abort();
            debug!(path = %event.path, kind = %event.kind, "restarted debounce timer");
        } else {
            debug!(path = %event.path, kind = %event.kind, "starting debounce timer");
        }

        state.generation += 1;
        let generation = state.generation;
        let quiet_period = state.quiet_period;
        let inner = Arc::clone(&self.inner);
        let handle = self.inner.runtime.spawn(async move {
            tokio::time::sleep(quiet_period).await;
            inner.fire(generation);
        });
        state.pending = Some(PendingTimer { generation, handle });
        true
    }

    /// Drop the pending timer, if any, without settling.
    pub fn cancel(&self) {
        if let Some(timer) = self.inner.lock_state().pending.take() {
            timer.handle.abort();
            debug!("debounce timer cancelled");
        }
    }

    /// Whether a timer is currently armed.
    pub fn is_pending(&self) -> bool {
        self.inner.lock_state().pending.is_some()
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Debouncer")
            .field("quiet_period", &state.quiet_period)
            .field("generation", &state.generation)
            .field("pending", &state.pending.is_some())
            .finish()
    }
}
