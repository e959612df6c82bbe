//! Build orchestration.
//!
//! Drives the sequence *preflight → fetch → native build → binding build*:
//! - the fetch and native build only run inside a live checkout
//! - every step must exit zero before the next one starts
//! - the binding build is refused until the native dependency is ready
//!
//! There is no retry, rollback or cleanup. A failed invocation is simply run
//! again; the external tools are expected to be idempotent.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::BuildConfig;
use crate::lock::{BuildLock, LockError};
use crate::preflight::{self, CheckoutState};
use crate::runner::{CommandRunner, SystemRunner};
use crate::state::{Phase, StateError, StateMachine};
use crate::step::{BuildSequence, BuildStep, Hook, StepKind};
use crate::version::{VersionError, read_binding_version};

/// Errors that abort an invocation.
#[derive(Debug, Error)]
pub enum OrchestratorError {
  /// A step ran and exited non-zero (or was killed by a signal).
  #[error("{kind} step failed with exit code {}: {command}", display_code(.code))]
  StepFailed {
    kind: StepKind,
    command: String,
    code: Option<i32>,
  },

  /// A step's program could not be started.
  #[error("{kind} step could not start `{command}`: {source}")]
  Spawn {
    kind: StepKind,
    command: String,
    #[source]
    source: io::Error,
  },

  /// The fetch succeeded but the nested dependency root is still missing.
  #[error("native dependency not found at {} after fetch", path.display())]
  MissingDependency { path: PathBuf },

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error(transparent)]
  Version(#[from] VersionError),
}

impl OrchestratorError {
  /// Process exit code to report for this error.
  ///
  /// A failed step forwards the child's own exit code; everything else is 1.
  pub fn exit_code(&self) -> i32 {
    match self {
      OrchestratorError::StepFailed { code: Some(code), .. } if *code != 0 => *code,
      _ => 1,
    }
  }

  /// The step this error belongs to, if it came from one.
  pub fn step(&self) -> Option<StepKind> {
    match self {
      OrchestratorError::StepFailed { kind, .. } | OrchestratorError::Spawn { kind, .. } => Some(*kind),
      OrchestratorError::MissingDependency { .. } => Some(StepKind::NativeBuild),
      _ => None,
    }
  }
}

fn display_code(code: &Option<i32>) -> String {
  match code {
    Some(code) => code.to_string(),
    None => "none (terminated by signal)".to_string(),
  }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_u64(duration.as_millis() as u64)
}

/// Record of a step that was started.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
  pub kind: StepKind,
  pub command: String,
  pub cwd: PathBuf,
  /// `None` when the process could not be spawned or was killed by a signal.
  pub code: Option<i32>,
  pub success: bool,
  #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
  pub elapsed: Duration,
}

/// Summary of one hook invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub hook: Hook,
  pub checkout: CheckoutState,
  pub phase: Phase,
  pub executed: Vec<StepOutcome>,
  /// Planned steps that never ran because an earlier step failed.
  pub skipped: Vec<StepKind>,
  /// Binding version, when a version file is configured and the binding was built.
  pub version: Option<String>,
  #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
  pub elapsed: Duration,
}

impl RunReport {
  pub fn is_success(&self) -> bool {
    self.phase == Phase::Done
  }
}

/// A failed invocation, with the report of what ran before the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
  pub report: RunReport,
  #[source]
  pub error: OrchestratorError,
}

/// Runs the build sequence for one checkout.
///
/// One orchestrator corresponds to one invocation. After a failure it stays
/// in [`Phase::Failed`]; construct a new one to try again.
pub struct Orchestrator<R: CommandRunner = SystemRunner> {
  config: BuildConfig,
  runner: R,
  state: StateMachine,
  outcomes: Vec<StepOutcome>,
}

impl Orchestrator<SystemRunner> {
  pub fn new(config: BuildConfig) -> Self {
    Self::with_runner(config, SystemRunner)
  }
}

impl<R: CommandRunner> Orchestrator<R> {
  pub fn with_runner(config: BuildConfig, runner: R) -> Self {
    Self {
      config,
      runner,
      state: StateMachine::new(),
      outcomes: Vec::new(),
    }
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  pub fn phase(&self) -> Phase {
    self.state.phase()
  }

  /// Steps started so far, in order.
  pub fn outcomes(&self) -> &[StepOutcome] {
    &self.outcomes
  }

  pub fn preflight(&self) -> CheckoutState {
    preflight::detect(&self.config.root)
  }

  /// The sequence `run(hook)` would execute right now. Spawns nothing.
  pub fn plan(&self, hook: Hook) -> BuildSequence {
    BuildSequence::for_hook(&self.config, self.preflight(), hook)
  }

  /// Fetch and compile the nested native dependency.
  ///
  /// Outside a checkout this is a no-op that succeeds without spawning
  /// anything. Inside one, the fetch runs first and the native build only
  /// runs if the fetch exited zero.
  pub fn ensure_native_dependency(&mut self) -> Result<CheckoutState, OrchestratorError> {
    let checkout = self.preflight();
    self.ensure_native_in(checkout)?;
    Ok(checkout)
  }

  fn ensure_native_in(&mut self, checkout: CheckoutState) -> Result<(), OrchestratorError> {
    self.state.begin_native()?;

    match checkout {
      CheckoutState::NotACheckout => {
        warn!(
          root = %self.config.root.display(),
          "not a checkout, assuming the native dependency is vendored"
        );
      }
      CheckoutState::Checkout => {
        self.execute(&BuildStep::fetch(&self.config))?;

        let native_dir = self.config.native_dir();
        if !native_dir.is_dir() {
          error!(path = %native_dir.display(), "native dependency missing after fetch");
          self.mark_failed();
          return Err(OrchestratorError::MissingDependency { path: native_dir });
        }

        self.execute(&BuildStep::native_build(&self.config))?;
      }
    }

    self.state.complete_native()?;
    Ok(())
  }

  /// Compile the binding module against the native build outputs, then read
  /// its version when a version file is configured. Finishes the invocation.
  ///
  /// Refused with [`StateError::NativeNotReady`] unless
  /// [`ensure_native_dependency`](Self::ensure_native_dependency) succeeded first.
  pub fn build_language_binding(&mut self) -> Result<Option<semver::Version>, OrchestratorError> {
    self.state.begin_binding()?;
    self.execute(&BuildStep::binding_build(&self.config))?;

    let version = match self.config.version_path() {
      Some(path) => match read_binding_version(&path) {
        Ok(version) => Some(version),
        Err(e) => {
          self.mark_failed();
          return Err(e.into());
        }
      },
      None => None,
    };

    self.state.finish()?;
    Ok(version)
  }

  /// Run a lifecycle hook end to end.
  ///
  /// The checkout state is read once up front and drives the plan, the
  /// executed steps and the report. Inside a checkout the run holds the lock
  /// in its VCS metadata directory; a vendored tree is never written to by
  /// the orchestrator itself.
  pub fn run(&mut self, hook: Hook) -> Result<RunReport, RunFailure> {
    let start = Instant::now();
    let checkout = self.preflight();
    let planned = BuildSequence::for_hook(&self.config, checkout, hook);
    info!(hook = %hook, checkout = %checkout, steps = planned.len(), "starting");

    let result = self.lock(checkout, hook).and_then(|_lock| self.run_locked(checkout, hook));

    match result {
      Ok(version) => {
        let report = self.report(hook, checkout, &planned, version, start.elapsed());
        info!(
          hook = %hook,
          steps = report.executed.len(),
          elapsed_ms = report.elapsed.as_millis() as u64,
          "finished"
        );
        Ok(report)
      }
      Err(error) => {
        let report = self.report(hook, checkout, &planned, None, start.elapsed());
        error!(hook = %hook, error = %error, "aborted");
        Err(RunFailure { report, error })
      }
    }
  }

  fn lock(&self, checkout: CheckoutState, hook: Hook) -> Result<Option<BuildLock>, OrchestratorError> {
    match checkout {
      CheckoutState::Checkout => Ok(Some(BuildLock::acquire(&self.config.root, hook.as_str())?)),
      CheckoutState::NotACheckout => {
        debug!(root = %self.config.root.display(), "no VCS metadata, running unlocked");
        Ok(None)
      }
    }
  }

  fn run_locked(
    &mut self,
    checkout: CheckoutState,
    hook: Hook,
  ) -> Result<Option<semver::Version>, OrchestratorError> {
    self.ensure_native_in(checkout)?;

    if hook.builds_binding() {
      return self.build_language_binding();
    }

    self.state.finish()?;
    Ok(None)
  }

  fn execute(&mut self, step: &BuildStep) -> Result<(), OrchestratorError> {
    info!(step = %step.kind, cmd = %step.command, cwd = %step.cwd.display(), "running step");

    let start = Instant::now();
    let result = self.runner.run(&step.command, &step.cwd);
    let elapsed = start.elapsed();

    let code = result.as_ref().ok().and_then(|status| status.code);
    let success = matches!(&result, Ok(status) if status.success());
    self.outcomes.push(StepOutcome {
      kind: step.kind,
      command: step.command.to_string(),
      cwd: step.cwd.clone(),
      code,
      success,
      elapsed,
    });

    match result {
      Ok(status) if status.success() => {
        info!(step = %step.kind, elapsed_ms = elapsed.as_millis() as u64, "step finished");
        Ok(())
      }
      Ok(status) => {
        error!(step = %step.kind, code = ?status.code, "step failed");
        self.mark_failed();
        Err(OrchestratorError::StepFailed {
          kind: step.kind,
          command: step.command.to_string(),
          code: status.code,
        })
      }
      Err(source) => {
        error!(step = %step.kind, error = %source, "step could not be started");
        self.mark_failed();
        Err(OrchestratorError::Spawn {
          kind: step.kind,
          command: step.command.to_string(),
          source,
        })
      }
    }
  }

  fn mark_failed(&mut self) {
    if let Err(e) = self.state.fail() {
      debug!(error = %e, "state already settled");
    }
  }

  fn report(
    &self,
    hook: Hook,
    checkout: CheckoutState,
    planned: &BuildSequence,
    version: Option<semver::Version>,
    elapsed: Duration,
  ) -> RunReport {
    let skipped = planned
      .kinds()
      .into_iter()
      .filter(|kind| !self.outcomes.iter().any(|o| o.kind == *kind))
      .collect();

    RunReport {
      hook,
      checkout,
      phase: self.state.phase(),
      executed: self.outcomes.clone(),
      skipped,
      version: version.map(|v| v.to_string()),
      elapsed,
    }
  }
}
