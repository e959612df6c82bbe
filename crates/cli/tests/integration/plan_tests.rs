//! `subforge plan` and `subforge status`: nothing is spawned.

use predicates::prelude::*;

use crate::common::TestEnv;

#[test]
fn plan_lists_steps_without_running_them() {
  let env = TestEnv::checkout();

  env
    .cmd()
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("Steps: 3"))
    .stdout(predicate::str::contains("native-build"))
    .stdout(predicate::str::contains("-j4"));

  assert!(env.calls().is_empty());
}

#[test]
fn plan_prepare_outside_checkout_is_empty() {
  let env = TestEnv::vendored();

  env
    .cmd()
    .args(["plan", "--prepare"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Steps: 0"))
    .stdout(predicate::str::contains("Nothing to do"));
}

#[test]
fn plan_json() {
  let env = TestEnv::checkout();

  let output = env.cmd().args(["--output", "json", "plan"]).output().unwrap();
  assert!(output.status.success());

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let kinds: Vec<_> = plan["steps"]
    .as_array()
    .unwrap()
    .iter()
    .map(|s| s["kind"].as_str().unwrap().to_string())
    .collect();
  assert_eq!(kinds, vec!["fetch", "native_build", "binding_build"]);
}

#[test]
fn status_reports_checkout_and_native_dir() {
  let env = TestEnv::checkout();

  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("Checkout: checkout"))
    .stdout(predicate::str::contains("missing"));

  std::fs::create_dir_all(env.native_dir()).unwrap();

  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("present"));

  assert!(env.calls().is_empty());
}
