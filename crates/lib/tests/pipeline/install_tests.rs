//! Install pipeline: the happy path, launcher behavior and rollback.

use std::fs;
use std::process::Command;

use tpb_lib::install::{self, InstallError, InstallOptions};
use tpb_lib::layout::live_manifest_path;
use tpb_lib::manifest;
use tpb_lib::tools::ToolError;

use super::common::{TestHost, VERSION};

fn add(env: &TestHost) -> Result<install::InstallReport, InstallError> {
  let host = env.open();
  install::add(&host, &env.origin_uri(), &InstallOptions::default())
}

#[test]
fn fresh_install_publishes_launcher() {
  let env = TestHost::new();

  let report = add(&env).unwrap();

  assert_eq!(report.identity, env.identity());
  assert_eq!(report.name, "tool");
  assert_eq!(report.version, VERSION);

  let host = env.open();
  let layout = host.layout();
  let paths = layout.bundle_paths(&env.identity());
  assert!(paths.content_root.join("usr/bin/tool").exists());
  assert_eq!(manifest::load_path(&paths.manifest_path).unwrap(), env.manifest());
  assert!(live_manifest_path(&paths.content_root).exists());
  assert!(!paths.state_dir.join("Swupd_Root.pem").exists(), "certificate copy should be deleted");
  assert!(layout.live_dir("bin").join("tool").exists());
  assert!(!layout.staging_dir("bin").exists());
}

#[test]
fn installer_is_invoked_with_script_suppression() {
  let env = TestHost::new();
  add(&env).unwrap();

  let calls = env.agent_calls();
  let install = calls.iter().find(|c| c.starts_with("verify ")).unwrap();
  assert!(install.starts_with("verify -f -b -N -S "));
  assert!(install.contains(&format!("-F 29 -m {VERSION} -x -B tool -C ")));
  assert!(install.contains(&format!("-u {}", env.origin_uri())));
}

#[test]
fn launcher_execs_payload_with_bundle_paths_first() {
  let env = TestHost::new();
  add(&env).unwrap();
  let host = env.open();
  let root = host.layout().bundle_content_root(&env.identity());
  let shim = host.layout().live_dir("bin").join("tool");

  let output = Command::new(&shim)
    .args(["a", "b c"])
    .env("PATH", "/usr/bin:/bin")
    .output()
    .unwrap();
  assert!(output.status.success());
  let stdout = String::from_utf8(output.stdout).unwrap();
  assert!(stdout.contains("tool:a b c"));
  assert!(stdout.contains(&format!("PATH={}/usr/bin:/usr/bin:/bin", root.display())));

  let output = Command::new(&shim).env("PATH", "").output().unwrap();
  let stdout = String::from_utf8(output.stdout).unwrap();
  assert!(
    stdout.contains(&format!("PATH={}/usr/bin\n", root.display())),
    "empty PATH must not leave an empty entry: {stdout}"
  );
}

#[test]
fn untrusted_certificate_leaves_nothing_behind() {
  let env = TestHost::new();
  env.inject("untrusted");

  let err = add(&env).unwrap_err();

  match &err {
    InstallError::Untrusted {
      source: ToolError::Failed { output, .. },
      ..
    } => assert!(output.contains("unable to get local issuer certificate")),
    other => panic!("expected untrusted certificate, got {other:?}"),
  }
  let host = env.open();
  assert!(env.leftovers(&host).is_empty());
  assert!(!env.agent_calls().iter().any(|c| c.starts_with("verify ")));
}

#[test]
fn failure_at_each_step_rolls_back_and_retry_succeeds() {
  for fault in ["untrusted", "bundle-add", "payload"] {
    let env = TestHost::new();
    let mut manifest = env.manifest();
    manifest.includes = vec!["editors".to_string()];
    env.publish(&manifest);
    env.inject(fault);

    assert!(add(&env).is_err(), "install should fail with fault {fault}");
    {
      let host = env.open();
      assert!(env.leftovers(&host).is_empty(), "fault {fault} left {:?}", env.leftovers(&host));
      assert!(!host.layout().live_dir("bin").exists());
    }

    env.clear(fault);
    add(&env).unwrap_or_else(|e| panic!("retry after {fault} failed: {e}"));
  }
}

#[test]
fn unwritable_state_parent_fails_before_content_is_created() {
  let env = TestHost::new();
  let blocked = env.open().layout().bundles_state_dir();
  fs::write(&blocked, "not a directory").unwrap();

  let err = add(&env).unwrap_err();

  assert!(matches!(err, InstallError::CreateDir { .. }), "got {err:?}");
  {
    let host = env.open();
    assert!(env.leftovers(&host).is_empty(), "left {:?}", env.leftovers(&host));
    assert!(!host.layout().live_dir("bin").exists());
  }

  fs::remove_file(&blocked).unwrap();
  add(&env).unwrap();
}

#[test]
fn content_root_failure_removes_created_state_dir() {
  use std::os::unix::fs::PermissionsExt;

  let env = TestHost::new();
  let chroot = env.open().layout().chroot_dir();
  fs::create_dir_all(&chroot).unwrap();
  fs::set_permissions(&chroot, fs::Permissions::from_mode(0o555)).unwrap();

  // Running as root bypasses the permission check entirely.
  let write_check = chroot.join("write-check");
  if fs::create_dir(&write_check).is_ok() {
    fs::remove_dir(&write_check).unwrap();
    fs::set_permissions(&chroot, fs::Permissions::from_mode(0o755)).unwrap();
    return;
  }

  let err = add(&env).unwrap_err();
  fs::set_permissions(&chroot, fs::Permissions::from_mode(0o755)).unwrap();

  match &err {
    InstallError::CreateDir { path, .. } => assert_eq!(path, &chroot.join(env.identity().as_str())),
    other => panic!("expected content root creation failure, got {other:?}"),
  }
  let host = env.open();
  assert!(env.leftovers(&host).is_empty(), "left {:?}", env.leftovers(&host));
  assert!(!host.layout().bundle_state_dir(&env.identity()).exists());
  drop(host);

  add(&env).unwrap();
}

#[test]
fn missing_certificate_rolls_back() {
  let env = TestHost::new();
  fs::remove_file(env.origin_dir().join(VERSION).join("Swupd_Root.pem")).unwrap();

  let err = add(&env).unwrap_err();

  assert!(matches!(err, InstallError::FetchCert(_)));
  assert!(env.leftovers(&env.open()).is_empty());
}

#[test]
fn failures_before_any_mutation_create_nothing() {
  let env = TestHost::new();
  env.inject("version");
  assert!(matches!(add(&env).unwrap_err(), InstallError::Version { .. }));
  env.clear("version");

  fs::remove_file(env.origin_dir().join(VERSION).join("user-config.toml")).unwrap();
  assert!(matches!(add(&env).unwrap_err(), InstallError::Manifest(_)));

  fs::remove_file(env.root().join("format")).unwrap();
  assert!(matches!(add(&env).unwrap_err(), InstallError::Format(_)));

  let host = env.open();
  assert!(env.leftovers(&host).is_empty());
  assert!(!host.layout().chroot_dir().exists());
}

#[test]
fn existing_bundle_is_refused_without_cleanup() {
  let env = TestHost::new();
  add(&env).unwrap();

  let err = add(&env).unwrap_err();

  assert!(matches!(err, InstallError::AlreadyPresent { .. }));
  assert_eq!(env.leftovers(&env.open()).len(), 3);
}

#[test]
fn skip_post_defers_launchers() {
  let env = TestHost::new();
  let host = env.open();

  install::add(&host, &env.origin_uri(), &InstallOptions { skip_post: true }).unwrap();

  assert!(!host.layout().live_dir("bin").exists());
  tpb_lib::postprocess::run(host.layout()).unwrap();
  assert!(host.layout().live_dir("bin").join("tool").exists());
}

#[test]
fn install_from_http_origin() {
  let env = TestHost::new();
  let mut server = mockito::Server::new();
  let origin = format!("{}/bundle", server.url());
  let mut published = env.manifest();
  published.url = origin.clone();
  let body = manifest::encode(&published).unwrap();
  let manifest_mock = server
    .mock("GET", format!("/bundle/{VERSION}/user-config.toml").as_str())
    .with_body(body)
    .create();
  let cert_mock = server
    .mock("GET", format!("/bundle/{VERSION}/Swupd_Root.pem").as_str())
    .with_body("PEM")
    .create();

  let host = env.open();
  let report = install::add(&host, &origin, &InstallOptions::default()).unwrap();

  manifest_mock.assert();
  cert_mock.assert();
  assert_eq!(report.identity, published.identity());
  assert!(host.layout().live_dir("bin").join("tool").exists());
}
