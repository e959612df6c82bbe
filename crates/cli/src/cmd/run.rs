//! Implementation of the `subforge build` and `subforge prepare` commands.
//!
//! Both run a lifecycle hook through the orchestrator. Child output streams
//! straight to the terminal; this command only adds a summary afterwards.

use std::process::ExitCode;

use anyhow::Result;
use tracing::debug;

use subforge_lib::{Hook, Orchestrator, RunReport};

use super::GlobalOpts;
use crate::output::{format_duration, print_error, print_info, print_json, print_stat, print_step, print_success};

/// Execute a hook and report the outcome.
///
/// On a failed step the process exit code is the child's own exit code, so
/// callers see the same status the failing tool returned.
pub fn cmd_run(opts: &GlobalOpts, hook: Hook) -> Result<ExitCode> {
  let config = opts.load_config()?;
  debug!(root = %config.root.display(), hook = %hook, "running hook");

  let mut orchestrator = Orchestrator::new(config);

  match orchestrator.run(hook) {
    Ok(report) => {
      if opts.output.is_json() {
        print_json(&report)?;
      } else {
        print_summary(&report);
        print_success(&format!("{} complete in {}", hook, format_duration(report.elapsed)));
        if let Some(version) = &report.version {
          print_stat("Version", version);
        }
      }
      Ok(ExitCode::SUCCESS)
    }
    Err(failure) => {
      let code = failure.error.exit_code();
      if opts.output.is_json() {
        print_json(&serde_json::json!({
          "report": failure.report,
          "error": failure.error.to_string(),
          "exit_code": code,
        }))?;
      } else {
        print_summary(&failure.report);
      }
      print_error(&format!("{} failed: {}", hook, failure.error));
      Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
    }
  }
}

fn print_summary(report: &RunReport) {
  println!();
  if !report.checkout.is_checkout() {
    print_info("Not a checkout: skipping fetch and native build");
  }
  for outcome in &report.executed {
    print_step(outcome);
  }
  for kind in &report.skipped {
    print_stat("Skipped", kind.as_str());
  }
}
