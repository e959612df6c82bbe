//! Orchestrator state machine.
//!
//! ```text
//! NotStarted -> NativeBuilding -> BindingBuilding -> Done
//!                     |                 |
//!                     +---> Failed <----+
//! ```
//!
//! `NativeBuilding -> Done` is also legal for hooks that stop after the native
//! dependency. `Failed` is terminal; recovery means starting a new invocation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  NotStarted,
  NativeBuilding,
  BindingBuilding,
  Done,
  Failed,
}

impl Phase {
  pub fn as_str(self) -> &'static str {
    match self {
      Phase::NotStarted => "not-started",
      Phase::NativeBuilding => "native-building",
      Phase::BindingBuilding => "binding-building",
      Phase::Done => "done",
      Phase::Failed => "failed",
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Phase::Done | Phase::Failed)
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
  #[error("invalid transition from {from} to {to}")]
  InvalidTransition { from: Phase, to: Phase },

  #[error("binding build requires a completed native dependency (current phase: {0})")]
  NativeNotReady(Phase),

  #[error("invocation already failed; start a new one")]
  AlreadyFailed,
}

/// Tracks the phase of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
  phase: Phase,
  native_ready: bool,
}

impl Default for StateMachine {
  fn default() -> Self {
    Self::new()
  }
}

impl StateMachine {
  pub fn new() -> Self {
    Self {
      phase: Phase::NotStarted,
      native_ready: false,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  /// Enter `NativeBuilding`. Re-entering after a completed native phase is
  /// allowed, the steps are idempotent.
  pub fn begin_native(&mut self) -> Result<(), StateError> {
    match self.phase {
      Phase::NotStarted => {}
      Phase::NativeBuilding if self.native_ready => {}
      Phase::Failed => return Err(StateError::AlreadyFailed),
      from => {
        return Err(StateError::InvalidTransition {
          from,
          to: Phase::NativeBuilding,
        });
      }
    }
    self.phase = Phase::NativeBuilding;
    self.native_ready = false;
    Ok(())
  }

  pub fn complete_native(&mut self) -> Result<(), StateError> {
    if self.phase != Phase::NativeBuilding {
      return Err(StateError::InvalidTransition {
        from: self.phase,
        to: Phase::NativeBuilding,
      });
    }
    self.native_ready = true;
    Ok(())
  }

  /// Enter `BindingBuilding`; only legal after a completed native phase.
  pub fn begin_binding(&mut self) -> Result<(), StateError> {
    match self.phase {
      Phase::NativeBuilding if self.native_ready => {
        self.phase = Phase::BindingBuilding;
        Ok(())
      }
      Phase::Failed => Err(StateError::AlreadyFailed),
      from => Err(StateError::NativeNotReady(from)),
    }
  }

  pub fn finish(&mut self) -> Result<(), StateError> {
    match self.phase {
      Phase::BindingBuilding => {}
      Phase::NativeBuilding if self.native_ready => {}
      Phase::Failed => return Err(StateError::AlreadyFailed),
      from => return Err(StateError::InvalidTransition { from, to: Phase::Done }),
    }
    self.phase = Phase::Done;
    Ok(())
  }

  /// Move to `Failed` from an in-progress phase.
  pub fn fail(&mut self) -> Result<(), StateError> {
    match self.phase {
      from @ Phase::NotStarted => Err(StateError::InvalidTransition { from, to: Phase::Failed }),
      from if from.is_terminal() => Err(StateError::InvalidTransition { from, to: Phase::Failed }),
      _ => {
        self.phase = Phase::Failed;
        self.native_ready = false;
        Ok(())
      }
    }
  }
}
