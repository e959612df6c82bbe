//! Implementation of the `subforge plan` command.
//!
//! Prints the step sequence a hook would run for the current checkout state.
//! Nothing is spawned and no lock is taken.

use anyhow::Result;

use subforge_lib::{Hook, Orchestrator};

use super::GlobalOpts;
use crate::output::{print_info, print_json, print_stat, symbols};

pub fn cmd_plan(opts: &GlobalOpts, hook: Hook) -> Result<()> {
  let config = opts.load_config()?;
  let orchestrator = Orchestrator::new(config);

  let checkout = orchestrator.preflight();
  let sequence = orchestrator.plan(hook);

  if opts.output.is_json() {
    return print_json(&serde_json::json!({
      "hook": hook,
      "checkout": checkout,
      "steps": sequence,
    }));
  }

  println!("Plan: {}", hook);
  print_stat("Root", &orchestrator.config().root.display().to_string());
  print_stat("Checkout", checkout.as_str());
  println!("Steps: {}", sequence.len());
  for (i, step) in sequence.steps().iter().enumerate() {
    println!("  {}. {:<14} {}", i + 1, step.kind.as_str(), step.command);
    println!("     {} {}", symbols::ARROW, step.cwd.display());
  }

  if sequence.is_empty() {
    print_info("Nothing to do");
  }

  Ok(())
}
