mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use subforge_lib::Hook;

use crate::cmd::{GlobalOpts, cmd_plan, cmd_run, cmd_status};
use crate::output::{OutputFormat, print_error};

/// subforge - build a vendored native dependency, then the binding on top of it
#[derive(Parser)]
#[command(name = "subforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Checkout root (default: current directory)
  #[arg(long, global = true, default_value = ".")]
  root: PathBuf,

  /// Configuration file (default: <root>/subforge.toml when present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Parallel jobs for the native build
  #[arg(short, long, global = true)]
  jobs: Option<usize>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch and build the native dependency, then build the binding
  Build,

  /// Fetch and build the native dependency only
  Prepare,

  /// Show the steps that would run, without running them
  Plan {
    /// Plan the `prepare` hook instead of `build`
    #[arg(long)]
    prepare: bool,
  },

  /// Show checkout state and resolved configuration
  Status,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let opts = GlobalOpts {
    root: cli.root,
    config: cli.config,
    jobs: cli.jobs,
    output: cli.output,
  };

  let result = match cli.command {
    Commands::Build => cmd_run(&opts, Hook::Build),
    Commands::Prepare => cmd_run(&opts, Hook::Prepare),
    Commands::Plan { prepare } => {
      let hook = if prepare { Hook::Prepare } else { Hook::Build };
      cmd_plan(&opts, hook).map(|()| ExitCode::SUCCESS)
    }
    Commands::Status => cmd_status(&opts).map(|()| ExitCode::SUCCESS),
  };

  match result {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}
