//! Update, removal and listing against bundles installed by the pipeline.

use std::fs;

use tpb_lib::host::{Host, HostError};
use tpb_lib::install::{self, InstallOptions};
use tpb_lib::list;
use tpb_lib::lock::HostLockError;
use tpb_lib::postprocess;
use tpb_lib::remove::{self, RemovalMode, RemovalOutcome, RemoveOptions};
use tpb_lib::update::{self, UpdateOptions};

use super::common::TestHost;

fn installed() -> TestHost {
  let env = TestHost::new();
  let host = env.open();
  install::add(&host, &env.origin_uri(), &InstallOptions::default()).unwrap();
  env
}

#[test]
fn removal_is_idempotent() {
  let env = installed();
  let host = env.open();
  let url = env.origin_uri();

  let first = remove::remove(&host, &url, "tool", RemovalMode::Interactive, &RemoveOptions::default()).unwrap();
  let second = remove::remove(&host, &url, "tool", RemovalMode::Interactive, &RemoveOptions::default()).unwrap();

  assert_eq!(first.removed(), 3);
  assert!(second.targets.iter().all(|t| t.outcome == RemovalOutcome::Missing));
  assert!(env.leftovers(&host).is_empty());
  assert!(!host.layout().live_dir("bin").join("tool").exists());
  assert!(host.layout().live_dir("bin").is_dir());
}

#[test]
fn update_refreshes_dependencies_from_published_manifest() {
  let env = installed();
  let mut newer = env.manifest();
  newer.includes = vec!["editors".to_string(), "python3-basic".to_string()];
  newer.description = "A newer tool".to_string();
  let host = env.open();
  let content_root = host.layout().bundle_content_root(&env.identity());
  tpb_lib::manifest::write(&tpb_lib::layout::live_manifest_path(&content_root), &newer, true).unwrap();

  let report = update::update_all(&host, &UpdateOptions::default()).unwrap();

  assert_eq!(report.updated, vec![env.identity()]);
  assert!(env.agent_calls().contains(&"bundle-add editors python3-basic".to_string()));

  let listings = list::list(&host).unwrap();
  assert_eq!(listings.len(), 1);
  assert_eq!(listings[0].description, "A newer tool");
  assert_eq!(listings[0].includes, vec!["editors", "python3-basic"]);
  assert!(host.layout().live_dir("bin").join("tool").exists());
}

#[test]
fn update_agent_failure_keeps_bundle_and_launcher() {
  let env = installed();
  env.inject("update");
  let host = env.open();

  let report = update::update_all(&host, &UpdateOptions::default()).unwrap();

  assert!(report.updated.is_empty());
  assert_eq!(report.failed.len(), 1);
  assert_eq!(env.leftovers(&host).len(), 3);
  assert!(host.layout().live_dir("bin").join("tool").exists());
}

#[test]
fn partial_content_without_manifest_is_skipped() {
  let env = installed();
  let host = env.open();
  let manifest_path = host.layout().bundle_manifest_path(&env.identity());
  fs::remove_file(&manifest_path).unwrap();

  assert!(list::list(&host).unwrap().is_empty());
  let report = update::update_all(&host, &UpdateOptions::default()).unwrap();
  assert_eq!(report.failed.len(), 1);
  assert!(!host.layout().live_dir("bin").join("tool").exists());
}

#[test]
fn manifest_without_content_is_not_enumerated() {
  let env = installed();
  let host = env.open();
  fs::remove_dir_all(host.layout().bundle_content_root(&env.identity())).unwrap();

  assert_eq!(postprocess::installed_bundles(host.layout()).unwrap().count(), 0);
  assert!(list::list(&host).unwrap().is_empty());
  let report = postprocess::run(host.layout()).unwrap();
  assert!(report.shims.is_empty());
}

#[test]
fn post_processing_swap_leaves_exactly_the_live_launchers() {
  let env = installed();
  let host = env.open();
  let layout = host.layout();
  fs::create_dir_all(layout.staging_dir("bin")).unwrap();
  fs::write(layout.staging_dir("bin").join("leftover"), "").unwrap();

  let report = postprocess::run(layout).unwrap();

  let live: Vec<_> = fs::read_dir(layout.live_dir("bin"))
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  assert_eq!(live, vec!["tool"]);
  assert_eq!(report.shims.len(), 1);
  assert!(!layout.staging_dir("bin").exists());
}

#[test]
fn host_lock_excludes_a_second_session() {
  let env = TestHost::new();
  let _held = env.open();

  let err = Host::open(env.config(), "add").unwrap_err();

  assert!(matches!(err, HostError::Lock(HostLockError::Contention { .. })));
}
