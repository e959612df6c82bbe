//! Child-process execution.
//!
//! [`CommandRunner`] is the only place the orchestrator touches the outside
//! world. [`SystemRunner`] spawns real processes; tests substitute a runner
//! that records invocations instead.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use serde::Serialize;
use tracing::debug;

use crate::step::CommandSpec;

/// Exit status of a finished child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepStatus {
  /// Exit code, `None` when the process was terminated by a signal.
  pub code: Option<i32>,
}

impl StepStatus {
  pub const SUCCESS: StepStatus = StepStatus { code: Some(0) };

  pub fn from_code(code: i32) -> Self {
    Self { code: Some(code) }
  }

  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

impl From<ExitStatus> for StepStatus {
  fn from(status: ExitStatus) -> Self {
    Self { code: status.code() }
  }
}

/// Runs one command to completion in a working directory.
///
/// Implementations block until the command exits. An `Err` means the command
/// could not be started at all; a started command always yields a status.
pub trait CommandRunner {
  fn run(&self, command: &CommandSpec, cwd: &Path) -> io::Result<StepStatus>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
  fn run(&self, command: &CommandSpec, cwd: &Path) -> io::Result<StepStatus> {
    (**self).run(command, cwd)
  }
}

/// Spawns commands as child processes.
///
/// Children inherit the caller's environment and standard streams, so build
/// output reaches the terminal unfiltered.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn run(&self, command: &CommandSpec, cwd: &Path) -> io::Result<StepStatus> {
    debug!(program = %command.program, cwd = %cwd.display(), "spawning process");

    let status = Command::new(&command.program)
      .args(&command.args)
      .current_dir(cwd)
      .stdin(Stdio::inherit())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit())
      .status()?;

    debug!(code = ?status.code(), "process exited");
    Ok(status.into())
  }
}
