//! Bundle lifecycle through the CLI: add, list, remove, update.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn add_list_remove_round_trip() {
  let env = TestEnv::new();

  env
    .tpb_cmd()
    .args(["add", &env.origin_uri()])
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed tool"));

  let shim = env.content_path().join("bin").join("tool");
  assert!(shim.exists(), "launcher should be published after add");
  let output = std::process::Command::new(&shim).arg("hello").output().unwrap();
  assert!(String::from_utf8_lossy(&output.stdout).contains("tool:hello"));

  env
    .tpb_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("tool"))
    .stdout(predicate::str::contains("An example tool"))
    .stdout(predicate::str::contains("editors"));

  env
    .tpb_cmd()
    .args(["remove", &env.origin_uri(), "tool"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed tool"));

  assert!(!shim.exists(), "launcher should be gone after remove");
  assert!(env.chroot_entries().is_empty());
}

#[test]
fn list_json_describes_bundle() {
  let env = TestEnv::new();
  env.tpb_cmd().args(["add", &env.origin_uri()]).assert().success();

  let output = env.tpb_cmd().args(["list", "--output", "json"]).output().unwrap();
  assert!(output.status.success());

  let listings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let bundle = &listings[0];
  assert_eq!(bundle["name"], "tool");
  assert_eq!(bundle["url"], env.origin_uri().as_str());
  assert_eq!(bundle["bin"][0], "usr/bin/tool");
  assert_eq!(bundle["includes"][0], "editors");
  assert_eq!(bundle["identity"].as_str().unwrap().len(), 64);
}

#[test]
fn untrusted_certificate_fails_and_leaves_nothing() {
  let env = TestEnv::new();
  env.write_file("untrusted", "");

  env
    .tpb_cmd()
    .args(["add", &env.origin_uri()])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not trusted"));

  assert!(env.chroot_entries().is_empty());
  let state_bundles = env.state_path().join("3rd-party");
  assert!(!state_bundles.exists() || std::fs::read_dir(&state_bundles).unwrap().next().is_none());
}

#[test]
fn second_add_is_refused() {
  let env = TestEnv::new();
  env.tpb_cmd().args(["add", &env.origin_uri()]).assert().success();

  env
    .tpb_cmd()
    .args(["add", &env.origin_uri()])
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));

  assert_eq!(env.chroot_entries().len(), 2);
}

#[test]
fn skip_post_then_post_process() {
  let env = TestEnv::new();
  let shim = env.content_path().join("bin").join("tool");

  env
    .tpb_cmd()
    .args(["--skip-post", "add", &env.origin_uri()])
    .assert()
    .success();
  assert!(!shim.exists());

  env
    .tpb_cmd()
    .arg("post-process")
    .assert()
    .success()
    .stdout(predicate::str::contains("Launchers regenerated"));
  assert!(shim.exists());
}

#[test]
fn update_reports_each_bundle() {
  let env = TestEnv::new();
  env.tpb_cmd().args(["add", &env.origin_uri()]).assert().success();

  env
    .tpb_cmd()
    .arg("update")
    .assert()
    .success()
    .stdout(predicate::str::contains("Update complete"));
}

#[test]
fn partial_bundle_is_skipped_with_warning() {
  let env = TestEnv::new();
  env.tpb_cmd().args(["add", &env.origin_uri()]).assert().success();
  let manifest = env
    .chroot_entries()
    .into_iter()
    .find(|name| name.ends_with(".toml"))
    .unwrap();
  std::fs::remove_file(env.content_path().join("chroot").join(manifest)).unwrap();

  env
    .tpb_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("No bundles installed"))
    .stderr(predicate::str::contains("WARNING:"));

  env
    .tpb_cmd()
    .arg("update")
    .assert()
    .success()
    .stderr(predicate::str::contains("not updated"));
}
