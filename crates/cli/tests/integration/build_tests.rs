//! `subforge build` and `subforge prepare` against fake tools.

use predicates::prelude::*;
use subforge_lib::lock::BuildLock;

use crate::common::TestEnv;

#[test]
fn build_in_checkout_runs_all_steps_in_order() {
  let env = TestEnv::checkout();

  env
    .cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("build complete"));

  let calls = env.calls();
  assert_eq!(env.tools(), vec!["git", "native", "binding"]);

  assert_eq!(calls[0].cwd, env.root);
  assert_eq!(calls[0].args, "submodule update --init");

  assert_eq!(calls[1].cwd, env.native_dir());
  assert_eq!(calls[1].args, "CXXFLAGS=-O3 -j4");

  assert_eq!(calls[2].cwd, env.root);
  assert_eq!(calls[2].args, "");
}

#[test]
fn build_outside_checkout_only_builds_binding() {
  let env = TestEnv::vendored();

  env
    .cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Not a checkout"));

  assert_eq!(env.tools(), vec!["binding"]);
}

#[test]
fn prepare_outside_checkout_spawns_nothing() {
  let env = TestEnv::vendored();

  env.cmd().arg("prepare").assert().success();

  assert!(env.calls().is_empty());
  assert_eq!(env.entries(), vec!["subforge.toml"]);
}

#[test]
fn build_in_checkout_leaves_no_lock_in_working_tree() {
  let env = TestEnv::checkout();

  env.cmd().arg("build").assert().success();

  assert_eq!(env.entries(), vec![".git", "submodules", "subforge.toml"]);
  assert!(env.root.join(".git/subforge.lock").exists());
}

#[test]
fn prepare_in_checkout_skips_binding() {
  let env = TestEnv::checkout();

  env.cmd().arg("prepare").assert().success();

  assert_eq!(env.tools(), vec!["git", "native"]);
}

#[test]
fn fetch_failure_stops_the_sequence() {
  let env = TestEnv::checkout();

  env
    .cmd()
    .arg("build")
    .env("FAKE_GIT_EXIT", "42")
    .assert()
    .code(42)
    .stderr(predicate::str::contains("fetch step failed"));

  assert_eq!(env.tools(), vec!["git"]);
}

#[test]
fn native_failure_propagates_exit_code() {
  let env = TestEnv::checkout();

  env
    .cmd()
    .arg("build")
    .env("FAKE_NATIVE_EXIT", "3")
    .assert()
    .code(3)
    .stderr(predicate::str::contains("native-build step failed"))
    .stdout(predicate::str::contains("binding-build"));

  assert_eq!(env.tools(), vec!["git", "native"]);
}

#[test]
fn binding_failure_propagates_exit_code() {
  let env = TestEnv::vendored();

  env
    .cmd()
    .arg("build")
    .env("FAKE_BINDING_EXIT", "5")
    .assert()
    .code(5)
    .stderr(predicate::str::contains("binding-build step failed"));

  assert_eq!(env.tools(), vec!["binding"]);
}

#[test]
fn missing_dependency_after_fetch_fails() {
  let env = TestEnv::checkout();

  env
    .cmd()
    .arg("build")
    .env("FAKE_SKIP_CHECKOUT", "1")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("native dependency not found"));

  assert_eq!(env.tools(), vec!["git"]);
}

#[test]
fn build_twice_is_idempotent() {
  let env = TestEnv::checkout();

  env.cmd().arg("build").assert().success();
  env.cmd().arg("build").assert().success();

  assert_eq!(
    env.tools(),
    vec!["git", "native", "binding", "git", "native", "binding"]
  );
}

#[test]
fn jobs_flag_overrides_environment() {
  let env = TestEnv::checkout();

  env.cmd().args(["--jobs", "8", "prepare"]).env("SUBFORGE_JOBS", "6").assert().success();
  env.cmd().arg("prepare").env("SUBFORGE_JOBS", "6").assert().success();

  let native: Vec<_> = env.calls().into_iter().filter(|c| c.tool == "native").collect();
  assert_eq!(native[0].args, "CXXFLAGS=-O3 -j8");
  assert_eq!(native[1].args, "CXXFLAGS=-O3 -j6");
}

#[test]
fn zero_jobs_rejected() {
  let env = TestEnv::checkout();

  env
    .cmd()
    .args(["--jobs", "0", "build"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Invalid --jobs"));

  assert!(env.calls().is_empty());
}

#[test]
fn version_is_reported_after_binding_build() {
  let env = TestEnv::vendored();
  env.write_config("version_file = \"VERSION\"");

  env
    .cmd()
    .arg("build")
    .env("FAKE_VERSION", "1.4.2")
    .assert()
    .success()
    .stdout(predicate::str::contains("1.4.2"));
}

#[test]
fn json_report() {
  let env = TestEnv::checkout();

  let output = env.cmd().args(["--output", "json", "build"]).output().unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["hook"], "build");
  assert_eq!(report["checkout"], "checkout");
  assert_eq!(report["phase"], "done");
  assert_eq!(report["executed"].as_array().unwrap().len(), 3);
  assert_eq!(report["executed"][1]["kind"], "native_build");
}

#[test]
fn json_report_on_failure() {
  let env = TestEnv::checkout();

  let output = env
    .cmd()
    .args(["-o", "json", "build"])
    .env("FAKE_GIT_EXIT", "9")
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(9));

  let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(body["exit_code"], 9);
  assert_eq!(body["report"]["phase"], "failed");
  assert_eq!(body["report"]["skipped"], serde_json::json!(["native_build", "binding_build"]));
}

#[test]
fn concurrent_build_is_refused() {
  let env = TestEnv::checkout();
  let _held = BuildLock::acquire(&env.root, "build").unwrap();

  env
    .cmd()
    .arg("build")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("locked by another build"));

  assert!(env.calls().is_empty());
}

#[test]
fn missing_program_is_reported() {
  let env = TestEnv::vendored();
  std::fs::write(
    env.root.join("subforge.toml"),
    "[binding]\nprogram = \"subforge-no-such-make\"\n",
  )
  .unwrap();

  env
    .cmd()
    .arg("build")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("could not start"));
}
