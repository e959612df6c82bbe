mod plan;
mod run;
mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};

use subforge_lib::BuildConfig;

use crate::output::OutputFormat;

pub use plan::cmd_plan;
pub use run::cmd_run;
pub use status::cmd_status;

/// Flags shared by every subcommand.
pub struct GlobalOpts {
  pub root: PathBuf,
  pub config: Option<PathBuf>,
  pub jobs: Option<usize>,
  pub output: OutputFormat,
}

impl GlobalOpts {
  /// Resolve configuration: defaults, config file, environment, then flags.
  pub fn load_config(&self) -> Result<BuildConfig> {
    let mut config =
      BuildConfig::load(&self.root, self.config.as_deref()).context("Failed to load configuration")?;
    if let Some(jobs) = self.jobs {
      config.set_jobs(jobs).context("Invalid --jobs")?;
    }
    Ok(config)
  }
}
