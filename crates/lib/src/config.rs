//! Orchestrator configuration.
//!
//! Everything the orchestrator would otherwise read from ambient process state
//! (working directory, tool names, parallelism) lives in [`BuildConfig`]. Values
//! are layered: built-in defaults, then an optional `subforge.toml`, then
//! `SUBFORGE_*` environment variables. The CLI applies its own flags last.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILENAME, DEFAULT_JOBS, DEFAULT_NATIVE_PATH, ENV_GIT, ENV_JOBS, ENV_MAKE};

/// Errors that can occur while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {}", path.display())]
  NotFound { path: PathBuf },

  #[error("failed to read config file {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("failed to parse config file {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid checkout root {}: {source}", path.display())]
  Root { path: PathBuf, source: std::io::Error },

  #[error("invalid value for {var}: {value:?}")]
  InvalidEnv { var: String, value: String },

  #[error("parallelism must be at least 1")]
  InvalidJobs,

  #[error("{section}.program must not be empty")]
  EmptyProgram { section: &'static str },
}

/// A program and its fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolConfig {
  pub program: String,
  pub args: Vec<String>,
}

/// Settings for the nested native dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeConfig {
  /// Dependency root, relative to the checkout root.
  pub path: PathBuf,
  pub tool: ToolConfig,
  /// Concurrent compilation jobs requested from the native build tool.
  pub jobs: usize,
}

/// Settings for the local binding build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingConfig {
  pub tool: ToolConfig,
  /// File written by the binding build that holds its version, relative to the root.
  pub version_file: Option<PathBuf>,
}

/// Fully resolved orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
  /// Checkout root every other path is resolved against.
  pub root: PathBuf,
  pub fetch: ToolConfig,
  pub native: NativeConfig,
  pub binding: BindingConfig,
}

impl BuildConfig {
  /// Default configuration rooted at `root`.
  ///
  /// Mirrors the classic hook: `git submodule update --init`, then
  /// `make CXXFLAGS=-O3 -j4` in `submodules/occa`, then `make` in the root.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      fetch: ToolConfig {
        program: "git".to_string(),
        args: vec!["submodule".to_string(), "update".to_string(), "--init".to_string()],
      },
      native: NativeConfig {
        path: PathBuf::from(DEFAULT_NATIVE_PATH),
        tool: ToolConfig {
          program: "make".to_string(),
          args: vec!["CXXFLAGS=-O3".to_string()],
        },
        jobs: DEFAULT_JOBS,
      },
      binding: BindingConfig {
        tool: ToolConfig {
          program: "make".to_string(),
          args: Vec::new(),
        },
        version_file: None,
      },
    }
  }

  /// Resolve the configuration for a checkout.
  ///
  /// `config_path` names an explicit file which must exist. Without it,
  /// `<root>/subforge.toml` is used when present. Environment overrides are
  /// applied afterwards.
  pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self, ConfigError> {
    let root = dunce::canonicalize(root).map_err(|source| ConfigError::Root {
      path: root.to_path_buf(),
      source,
    })?;

    let mut config = Self::new(root.clone());

    let file_path = match config_path {
      Some(path) if !path.exists() => {
        return Err(ConfigError::NotFound {
          path: path.to_path_buf(),
        });
      }
      Some(path) => Some(path.to_path_buf()),
      None => Some(root.join(CONFIG_FILENAME)).filter(|p| p.exists()),
    };

    if let Some(path) = file_path {
      debug!(path = %path.display(), "loading config file");
      config.apply_file(ConfigFile::read(&path)?);
    }

    config.apply_env()?;
    config.validate()?;
    Ok(config)
  }

  /// Overlay the values present in a parsed config file.
  pub fn apply_file(&mut self, file: ConfigFile) {
    if let Some(fetch) = file.fetch {
      fetch.apply(&mut self.fetch);
    }
    if let Some(native) = file.native {
      if let Some(path) = native.path {
        self.native.path = path;
      }
      if let Some(jobs) = native.jobs {
        self.native.jobs = jobs;
      }
      ToolSection {
        program: native.program,
        args: native.args,
      }
      .apply(&mut self.native.tool);
    }
    if let Some(binding) = file.binding {
      if binding.version_file.is_some() {
        self.binding.version_file = binding.version_file;
      }
      ToolSection {
        program: binding.program,
        args: binding.args,
      }
      .apply(&mut self.binding.tool);
    }
  }

  /// Overlay `SUBFORGE_GIT`, `SUBFORGE_MAKE` and `SUBFORGE_JOBS`.
  pub fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Some(git) = non_empty_var(ENV_GIT) {
      debug!(program = %git, "fetch program overridden from environment");
      self.fetch.program = git;
    }

    if let Some(make) = non_empty_var(ENV_MAKE) {
      debug!(program = %make, "build program overridden from environment");
      self.native.tool.program = make.clone();
      self.binding.tool.program = make;
    }

    if let Some(jobs) = non_empty_var(ENV_JOBS) {
      self.native.jobs = jobs.parse().map_err(|_| ConfigError::InvalidEnv {
        var: ENV_JOBS.to_string(),
        value: jobs.clone(),
      })?;
    }

    Ok(())
  }

  /// Set the native build parallelism, rejecting zero.
  pub fn set_jobs(&mut self, jobs: usize) -> Result<(), ConfigError> {
    if jobs == 0 {
      return Err(ConfigError::InvalidJobs);
    }
    self.native.jobs = jobs;
    Ok(())
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.native.jobs == 0 {
      return Err(ConfigError::InvalidJobs);
    }
    for (section, tool) in [
      ("fetch", &self.fetch),
      ("native", &self.native.tool),
      ("binding", &self.binding.tool),
    ] {
      if tool.program.trim().is_empty() {
        return Err(ConfigError::EmptyProgram { section });
      }
    }
    Ok(())
  }

  /// Absolute path of the nested native dependency.
  pub fn native_dir(&self) -> PathBuf {
    self.root.join(&self.native.path)
  }

  /// Absolute path of the binding version file, if one is configured.
  pub fn version_path(&self) -> Option<PathBuf> {
    self.binding.version_file.as_ref().map(|p| self.root.join(p))
  }
}

fn non_empty_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// On-disk form of `subforge.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
  pub fetch: Option<ToolSection>,
  pub native: Option<NativeSection>,
  pub binding: Option<BindingSection>,
}

impl ConfigFile {
  pub fn read(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSection {
  pub program: Option<String>,
  pub args: Option<Vec<String>>,
}

impl ToolSection {
  fn apply(self, tool: &mut ToolConfig) {
    if let Some(program) = self.program {
      tool.program = program;
    }
    if let Some(args) = self.args {
      tool.args = args;
    }
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NativeSection {
  pub path: Option<PathBuf>,
  pub jobs: Option<usize>,
  pub program: Option<String>,
  pub args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingSection {
  pub version_file: Option<PathBuf>,
  pub program: Option<String>,
  pub args: Option<Vec<String>>,
}
