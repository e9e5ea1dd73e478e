//! Orchestrator lifecycle states and the single routine that moves between them.

use std::fmt;

use crate::error::{OrchestratorError, Result};

/// Lifecycle state of the orchestrator.
///
/// `Running` is the only steady state; every other state is passed through
/// at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrchestratorState {
    Uninitialized,
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

impl OrchestratorState {
    /// `true` for the allowed one-directional edges of the lifecycle.
    pub fn can_transition_to(self, next: OrchestratorState) -> bool {
        use OrchestratorState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Uninitialized, Stopped)
                | (Initializing, Running)
                | (Initializing, Stopped)
                | (Initializing, ShuttingDown)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }

    /// `ShuttingDown` or `Stopped`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrchestratorState::ShuttingDown | OrchestratorState::Stopped
        )
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Uninitialized => "Uninitialized",
            OrchestratorState::Initializing => "Initializing",
            OrchestratorState::Running => "Running",
            OrchestratorState::ShuttingDown => "ShuttingDown",
            OrchestratorState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Owner of the current [`OrchestratorState`].
///
/// Every transition goes through [`StateMachine::transition`], which rejects
/// edges the lifecycle does not allow and logs the ones it does.
#[derive(Debug)]
pub struct StateMachine {
    current: OrchestratorState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: OrchestratorState::Uninitialized,
        }
    }

    pub fn current(&self) -> OrchestratorState {
        self.current
    }

    pub fn transition(&mut self, next: OrchestratorState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(OrchestratorError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::debug!(from = %self.current, to = %next, "orchestrator state transition");
        self.current = next;
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
