//! Shared test helpers for CLI integration tests.
//!
//! Each test gets a temporary checkout root plus fake `git`/`make` scripts
//! that append one line per invocation to a log file. The scripts are run
//! through `/bin/sh` so nothing has to be marked executable.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

const FAKE_GIT: &str = r#"
echo "git|$(pwd -P)|$*" >> "$SUBFORGE_TEST_LOG"
if [ -z "$FAKE_SKIP_CHECKOUT" ]; then
  mkdir -p submodules/occa
fi
exit "${FAKE_GIT_EXIT:-0}"
"#;

const FAKE_NATIVE_MAKE: &str = r#"
echo "native|$(pwd -P)|$*" >> "$SUBFORGE_TEST_LOG"
exit "${FAKE_NATIVE_EXIT:-0}"
"#;

const FAKE_BINDING_MAKE: &str = r#"
echo "binding|$(pwd -P)|$*" >> "$SUBFORGE_TEST_LOG"
if [ -n "$FAKE_VERSION" ]; then
  printf '%s\n' "$FAKE_VERSION" > VERSION
fi
exit "${FAKE_BINDING_EXIT:-0}"
"#;

/// One logged tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub tool: String,
  pub cwd: PathBuf,
  pub args: String,
}

/// Isolated checkout with fake tools.
pub struct TestEnv {
  pub temp: TempDir,
  pub root: PathBuf,
  log: PathBuf,
}

impl TestEnv {
  /// A root with `.git` metadata.
  pub fn checkout() -> Self {
    let env = Self::new();
    std::fs::create_dir(env.root.join(".git")).unwrap();
    env
  }

  /// A root without VCS metadata (vendored source tree).
  pub fn vendored() -> Self {
    Self::new()
  }

  /// Sorted names of the entries directly under the root.
  pub fn entries(&self) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(&self.root)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    names.sort();
    names
  }

  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    std::fs::create_dir_all(&root).unwrap();
    let root = std::fs::canonicalize(&root).unwrap();

    let bin = temp.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::write(bin.join("git"), FAKE_GIT).unwrap();
    std::fs::write(bin.join("make-native"), FAKE_NATIVE_MAKE).unwrap();
    std::fs::write(bin.join("make-binding"), FAKE_BINDING_MAKE).unwrap();

    let env = Self {
      log: temp.path().join("calls.log"),
      temp,
      root,
    };
    env.write_config("");
    env
  }

  fn script(&self, name: &str) -> String {
    quoted(&self.temp.path().join("bin").join(name))
  }

  /// Write `subforge.toml` wiring the fake tools, followed by `extra` lines.
  pub fn write_config(&self, extra: &str) {
    let config = format!(
      r#"[fetch]
program = "/bin/sh"
args = [{git}, "submodule", "update", "--init"]

[native]
program = "/bin/sh"
args = [{native}, "CXXFLAGS=-O3"]

[binding]
program = "/bin/sh"
args = [{binding}]
{extra}
"#,
      git = self.script("git"),
      native = self.script("make-native"),
      binding = self.script("make-binding"),
    );
    std::fs::write(self.root.join("subforge.toml"), config).unwrap();
  }

  /// The `subforge` binary rooted at this checkout with a clean environment.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("subforge");
    cmd
      .arg("--root")
      .arg(&self.root)
      .env("SUBFORGE_TEST_LOG", &self.log)
      .env("NO_COLOR", "1")
      .env_remove("RUST_LOG");
    for var in [
      "SUBFORGE_GIT",
      "SUBFORGE_MAKE",
      "SUBFORGE_JOBS",
      "FAKE_SKIP_CHECKOUT",
      "FAKE_GIT_EXIT",
      "FAKE_NATIVE_EXIT",
      "FAKE_BINDING_EXIT",
      "FAKE_VERSION",
    ] {
      cmd.env_remove(var);
    }
    cmd
  }

  /// Logged invocations, in order.
  pub fn calls(&self) -> Vec<Call> {
    let Ok(content) = std::fs::read_to_string(&self.log) else {
      return Vec::new();
    };
    content
      .lines()
      .map(|line| {
        let mut parts = line.splitn(3, '|');
        Call {
          tool: parts.next().unwrap_or_default().to_string(),
          cwd: PathBuf::from(parts.next().unwrap_or_default()),
          args: parts.next().unwrap_or_default().to_string(),
        }
      })
      .collect()
  }

  pub fn tools(&self) -> Vec<String> {
    self.calls().into_iter().map(|c| c.tool).collect()
  }

  pub fn native_dir(&self) -> PathBuf {
    self.root.join("submodules").join("occa")
  }
}

fn quoted(path: &Path) -> String {
  format!("{:?}", path.display().to_string())
}
