//! Checkout detection.
//!
//! The fetch and native build steps only make sense inside a live
//! version-controlled working copy. Source trees shipped with the native
//! dependency already vendored have no VCS metadata and skip both steps.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::consts::VCS_METADATA;

/// Result of inspecting the checkout root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
  /// VCS metadata is present: the nested dependency must be fetched and built.
  Checkout,
  /// No VCS metadata: the dependency is assumed to be vendored or pre-built.
  NotACheckout,
}

impl CheckoutState {
  pub fn is_checkout(self) -> bool {
    matches!(self, CheckoutState::Checkout)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      CheckoutState::Checkout => "checkout",
      CheckoutState::NotACheckout => "not a checkout",
    }
  }
}

impl fmt::Display for CheckoutState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Inspect `root` for VCS metadata.
///
/// `.git` may be a directory (regular clone) or a file (worktrees and nested
/// checkouts point at their real git dir through it); both count.
pub fn detect(root: &Path) -> CheckoutState {
  let metadata = root.join(VCS_METADATA);
  let state = if metadata.exists() {
    CheckoutState::Checkout
  } else {
    CheckoutState::NotACheckout
  };
  debug!(root = %root.display(), state = %state, "preflight");
  state
}

/// Resolve the VCS metadata directory of the checkout at `root`.
///
/// A `.git` file is followed through its `gitdir:` line, resolved against
/// `root` when relative. `None` outside a checkout or when the pointer is
/// unreadable.
pub fn metadata_dir(root: &Path) -> Option<PathBuf> {
  let metadata = root.join(VCS_METADATA);
  if metadata.is_dir() {
    return Some(metadata);
  }

  let content = std::fs::read_to_string(&metadata).ok()?;
  let target = content.lines().find_map(|line| line.strip_prefix("gitdir:"))?.trim();
  if target.is_empty() {
    return None;
  }

  let dir = root.join(target);
  dir.is_dir().then_some(dir)
}
