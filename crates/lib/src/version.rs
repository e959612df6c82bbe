//! Binding version probe.
//!
//! The binding build writes its version to a file; it can only be read after
//! that build has finished, which is why metadata collection always comes last.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum VersionError {
  #[error("failed to read binding version from {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("invalid binding version {value:?} in {}: {source}", path.display())]
  Invalid {
    path: PathBuf,
    value: String,
    #[source]
    source: semver::Error,
  },
}

/// Read and validate the version written by the binding build.
///
/// Surrounding whitespace and a leading `v` are ignored.
pub fn read_binding_version(path: &Path) -> Result<semver::Version, VersionError> {
  let content = std::fs::read_to_string(path).map_err(|source| VersionError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let value = content.trim();
  let version = semver::Version::parse(value.strip_prefix('v').unwrap_or(value)).map_err(|source| {
    VersionError::Invalid {
      path: path.to_path_buf(),
      value: value.to_string(),
      source,
    }
  })?;

  debug!(path = %path.display(), version = %version, "read binding version");
  Ok(version)
}
