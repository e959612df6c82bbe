//! Application-wide names and defaults.

pub const APP_NAME: &str = "subforge";

/// Configuration file looked up in the checkout root when `--config` is not given.
pub const CONFIG_FILENAME: &str = "subforge.toml";

/// Advisory lock file, kept inside the VCS metadata directory so the working
/// tree stays clean.
pub const LOCK_FILENAME: &str = "subforge.lock";

/// Version-control metadata whose presence marks a live checkout.
pub const VCS_METADATA: &str = ".git";

pub const DEFAULT_NATIVE_PATH: &str = "submodules/occa";
pub const DEFAULT_JOBS: usize = 4;

pub const ENV_GIT: &str = "SUBFORGE_GIT";
pub const ENV_MAKE: &str = "SUBFORGE_MAKE";
pub const ENV_JOBS: &str = "SUBFORGE_JOBS";
