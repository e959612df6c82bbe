//! Implementation of the `subforge status` command.
//!
//! Shows whether the root is a checkout, where the native dependency lives,
//! the resolved tool commands and whether another build holds the lock.

use std::path::PathBuf;

use anyhow::{Context, Result};

use subforge_lib::consts::CONFIG_FILENAME;
use subforge_lib::lock::BuildLock;
use subforge_lib::{BuildStep, preflight};

use super::GlobalOpts;
use crate::output::{print_json, print_stat, print_success, print_warning};

pub fn cmd_status(opts: &GlobalOpts) -> Result<()> {
  let config = opts.load_config()?;
  let checkout = preflight::detect(&config.root);
  let native_dir = config.native_dir();
  let native_present = native_dir.is_dir();
  let holder = BuildLock::holder(&config.root).context("Failed to inspect lock")?;

  let config_file = match &opts.config {
    Some(path) => Some(path.clone()),
    None => Some(config.root.join(CONFIG_FILENAME)).filter(|p| p.exists()),
  };

  let fetch = BuildStep::fetch(&config);
  let native = BuildStep::native_build(&config);
  let binding = BuildStep::binding_build(&config);

  if opts.output.is_json() {
    return print_json(&serde_json::json!({
      "root": config.root,
      "checkout": checkout,
      "config_file": config_file,
      "native_dir": native_dir,
      "native_present": native_present,
      "steps": [fetch, native, binding],
      "jobs": config.native.jobs,
      "version_file": config.version_path(),
      "lock_holder": holder,
    }));
  }

  print_success(&format!("subforge v{}", env!("CARGO_PKG_VERSION")));
  println!();
  print_stat("Root", &config.root.display().to_string());
  print_stat("Checkout", checkout.as_str());
  print_stat(
    "Config",
    &config_file
      .as_ref()
      .map(|p| p.display().to_string())
      .unwrap_or_else(|| "defaults".to_string()),
  );
  print_stat(
    "Native dir",
    &format!(
      "{} ({})",
      native_dir.display(),
      if native_present { "present" } else { "missing" }
    ),
  );
  print_stat("Jobs", &config.native.jobs.to_string());
  println!();
  print_stat("Fetch", &fetch.command.to_string());
  print_stat("Native", &native.command.to_string());
  print_stat("Binding", &binding.command.to_string());
  print_stat(
    "Version file",
    &config
      .version_path()
      .map(|p: PathBuf| p.display().to_string())
      .unwrap_or_else(|| "none".to_string()),
  );

  if let Some(holder) = holder {
    println!();
    print_warning(&format!(
      "Locked by {} (PID {}, started {})",
      holder.hook,
      holder.pid,
      holder.started_at()
    ));
  }

  Ok(())
}
