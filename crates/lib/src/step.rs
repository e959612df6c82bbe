//! Build steps and sequences.
//!
//! A [`BuildStep`] is a command plus the directory it runs in. Steps carry no
//! identity beyond their position in a [`BuildSequence`], which is always
//! executed front to back.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::{BuildConfig, ToolConfig};
use crate::preflight::CheckoutState;

/// What a step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
  /// Initialize and update the nested dependency checkout.
  Fetch,
  /// Compile the nested native dependency in place.
  NativeBuild,
  /// Compile the local binding module against the native build outputs.
  BindingBuild,
}

impl StepKind {
  pub fn as_str(self) -> &'static str {
    match self {
      StepKind::Fetch => "fetch",
      StepKind::NativeBuild => "native-build",
      StepKind::BindingBuild => "binding-build",
    }
  }
}

impl fmt::Display for StepKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A program and its arguments, spawned without a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
}

impl CommandSpec {
  pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      program: program.into(),
      args: args.into_iter().map(Into::into).collect(),
    }
  }

  fn from_tool(tool: &ToolConfig) -> Self {
    Self::new(tool.program.clone(), tool.args.iter().cloned())
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&quote(&self.program))?;
    for arg in &self.args {
      write!(f, " {}", quote(arg))?;
    }
    Ok(())
  }
}

fn quote(word: &str) -> String {
  if word.is_empty() || word.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
    format!("{:?}", word)
  } else {
    word.to_string()
  }
}

/// One unit of work. Success means the command exited with status zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStep {
  pub kind: StepKind,
  pub command: CommandSpec,
  pub cwd: PathBuf,
}

impl BuildStep {
  /// `git submodule update --init` (by default) in the checkout root.
  pub fn fetch(config: &BuildConfig) -> Self {
    Self {
      kind: StepKind::Fetch,
      command: CommandSpec::from_tool(&config.fetch),
      cwd: config.root.clone(),
    }
  }

  /// The native build tool in the dependency root, with `-j<jobs>` appended.
  pub fn native_build(config: &BuildConfig) -> Self {
    let mut command = CommandSpec::from_tool(&config.native.tool);
    command.args.push(format!("-j{}", config.native.jobs));
    Self {
      kind: StepKind::NativeBuild,
      command,
      cwd: config.native_dir(),
    }
  }

  /// The binding build command in the checkout root.
  pub fn binding_build(config: &BuildConfig) -> Self {
    Self {
      kind: StepKind::BindingBuild,
      command: CommandSpec::from_tool(&config.binding.tool),
      cwd: config.root.clone(),
    }
  }
}

/// Lifecycle entry point that selects how much of the sequence runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
  /// Native dependency, then the binding module.
  Build,
  /// Native dependency only, ahead of producing a source distribution.
  Prepare,
}

impl Hook {
  pub fn as_str(self) -> &'static str {
    match self {
      Hook::Build => "build",
      Hook::Prepare => "prepare",
    }
  }

  pub fn builds_binding(self) -> bool {
    matches!(self, Hook::Build)
  }
}

impl fmt::Display for Hook {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Ordered list of steps, executed front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildSequence {
  steps: Vec<BuildStep>,
}

impl BuildSequence {
  /// Steps that prepare the native dependency for the given checkout state.
  pub fn native(config: &BuildConfig, state: CheckoutState) -> Self {
    let steps = match state {
      CheckoutState::Checkout => vec![BuildStep::fetch(config), BuildStep::native_build(config)],
      CheckoutState::NotACheckout => Vec::new(),
    };
    Self { steps }
  }

  /// The complete sequence a hook runs.
  pub fn for_hook(config: &BuildConfig, state: CheckoutState, hook: Hook) -> Self {
    let mut sequence = Self::native(config, state);
    if hook.builds_binding() {
      sequence.steps.push(BuildStep::binding_build(config));
    }
    sequence
  }

  pub fn steps(&self) -> &[BuildStep] {
    &self.steps
  }

  pub fn kinds(&self) -> Vec<StepKind> {
    self.steps.iter().map(|s| s.kind).collect()
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

impl<'a> IntoIterator for &'a BuildSequence {
  type Item = &'a BuildStep;
  type IntoIter = std::slice::Iter<'a, BuildStep>;

  fn into_iter(self) -> Self::IntoIter {
    self.steps.iter()
  }
}
