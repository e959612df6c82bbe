//! subforge-lib: build orchestration for vendored native dependencies
//!
//! This crate prepares a nested native dependency and the binding module
//! built on top of it:
//! - `BuildConfig`: explicit configuration (root, tools, parallelism)
//! - `preflight`: decides whether the root is a live checkout
//! - `BuildSequence`: the ordered, fail-fast steps a hook runs
//! - `Orchestrator`: executes the sequence through a `CommandRunner`

pub mod config;
pub mod consts;
pub mod lock;
pub mod orchestrator;
pub mod preflight;
pub mod runner;
pub mod state;
pub mod step;
pub mod util;
pub mod version;

pub use config::{BuildConfig, ConfigError};
pub use orchestrator::{Orchestrator, OrchestratorError, RunFailure, RunReport, StepOutcome};
pub use preflight::CheckoutState;
pub use runner::{CommandRunner, StepStatus, SystemRunner};
pub use state::Phase;
pub use step::{BuildSequence, BuildStep, CommandSpec, Hook, StepKind};
