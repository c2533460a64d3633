use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// CycleState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Evaluating,
    Committing,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CycleState::Idle => "Idle",
            CycleState::Evaluating => "Evaluating",
            CycleState::Committing => "Committing",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// CycleEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleEvent {
    /// The debouncer settled.
    Settled,
    /// Nothing changed, the inspection failed, or the oracle said wait.
    Declined,
    /// The oracle said commit.
    Approved,
    /// The commit attempt finished, successfully or not.
    Finished,
}

impl fmt::Display for CycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CycleEvent::Settled => "Settled",
            CycleEvent::Declined => "Declined",
            CycleEvent::Approved => "Approved",
            CycleEvent::Finished => "Finished",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("invalid transition: cannot apply {event} in state {state}")]
    InvalidTransition { state: CycleState, event: CycleEvent },
}

// ---------------------------------------------------------------------------
// CycleStateMachine
// ---------------------------------------------------------------------------

/// Tracks where the orchestration loop is within one cycle.
#[derive(Debug, Clone)]
pub struct CycleStateMachine {
    current: CycleState,
    history: Vec<(CycleState, CycleEvent, CycleState)>,
}

impl CycleStateMachine {
    pub fn new() -> Self {
        Self {
            current: CycleState::Idle,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> CycleState {
        self.current
    }

    pub fn history(&self) -> &[(CycleState, CycleEvent, CycleState)] {
        &self.history
    }

    /// Attempt a state transition driven by `event`.
    ///
    /// Valid transitions:
    /// - Idle       + Settled  -> Evaluating
    /// - Evaluating + Declined -> Idle
    /// - Evaluating + Approved -> Committing
    /// - Committing + Finished -> Idle
    pub fn transition(&mut self, event: CycleEvent) -> Result<CycleState, StateMachineError> {
        let next = match (self.current, event) {
            (CycleState::Idle, CycleEvent::Settled) => CycleState::Evaluating,
            (CycleState::Evaluating, CycleEvent::Declined) => CycleState::Idle,
            (CycleState::Evaluating, CycleEvent::Approved) => CycleState::Committing,
            (CycleState::Committing, CycleEvent::Finished) => CycleState::Idle,
            _ => {
                return Err(StateMachineError::InvalidTransition {
                    state: self.current,
                    event,
                });
            }
        };

        let from = self.current;
        self.current = next;
        self.history.push((from, event, next));
        tracing::debug!(from = %from, event = %event, to = %next, "cycle state transition");
        Ok(next)
    }

    /// Apply `event`, logging an invalid transition instead of failing.
    pub fn advance(&mut self, event: CycleEvent) {
        if let Err(e) = self.transition(event) {
            tracing::error!(error = %e, "cycle state machine defect");
        }
    }

    /// Force the machine back to `Idle` and clear the history. Called at the
    /// start of each cycle so history covers one cycle only.
    pub fn reset(&mut self) {
        if self.current != CycleState::Idle {
            tracing::error!(state = %self.current, "cycle did not return to Idle");
        }
        self.current = CycleState::Idle;
        self.history.clear();
    }
}

impl Default for CycleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
