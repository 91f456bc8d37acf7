//! Install pipeline.
//!
//! Any failure after the bundle's directories exist rolls back through the
//! removal pipeline in quiet mode, so a failed install leaves nothing
//! behind for that identity and can simply be retried.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::consts::{CERT_BASENAME, MANIFEST_BASENAME};
use crate::fetch::{self, FetchError};
use crate::host::Host;
use crate::identity::BundleId;
use crate::layout::BundlePaths;
use crate::manifest::{self, ManifestError};
use crate::postprocess::{self, PostProcessError};
use crate::remove::{self, RemovalMode, RemoveOptions};
use crate::tools::{InstallRequest, ToolError};
use crate::util::create_dir_with_mode;

#[derive(Debug, Error)]
pub enum InstallError {
  #[error("unable to determine installed format: {0}")]
  Format(#[source] ToolError),

  #[error("unable to determine latest version at {uri}: {source}")]
  Version {
    uri: String,
    #[source]
    source: ToolError,
  },

  #[error("unable to load bundle manifest: {0}")]
  Manifest(#[source] ManifestError),

  #[error("{path} already exists; a previous install of '{name}' may be unfinished, remove it first")]
  AlreadyPresent { name: String, path: PathBuf },

  #[error("unable to create {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("unable to cache bundle manifest: {0}")]
  WriteManifest(#[source] ManifestError),

  #[error("unable to fetch root certificate: {0}")]
  FetchCert(#[source] FetchError),

  #[error("root certificate for {url} is not trusted: {source}")]
  Untrusted {
    url: String,
    #[source]
    source: ToolError,
  },

  #[error("unable to add dependency bundles {includes:?}: {source}")]
  Dependencies {
    includes: Vec<String>,
    #[source]
    source: ToolError,
  },

  #[error("bundle payload installation failed: {0}")]
  Payload(#[source] ToolError),

  #[error("post-processing after install failed: {0}")]
  PostProcess(#[from] PostProcessError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
  pub skip_post: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
  pub identity: BundleId,
  pub name: String,
  pub url: String,
  pub version: String,
}

/// Install the bundle published at `uri`.
pub fn add(host: &Host, uri: &str, options: &InstallOptions) -> Result<InstallReport, InstallError> {
  let layout = host.layout();
  let tools = host.tools();

  let format = tools.installed_format().map_err(InstallError::Format)?;
  let version = tools
    .latest_version(uri, layout.state_root())
    .map_err(|source| InstallError::Version {
      uri: uri.to_string(),
      source,
    })?;

  let manifest_uri = fetch::join_uri(uri, &format!("{version}/{MANIFEST_BASENAME}"));
  let bundle = manifest::load(&manifest_uri).map_err(InstallError::Manifest)?;
  if bundle.url != uri {
    warn!(requested = %uri, declared = %bundle.url, "bundle manifest declares a different origin URL");
  }

  let id = bundle.identity();
  let paths = layout.bundle_paths(&id);
  info!(bundle = %bundle.name, identity = %id, version = %version, "installing bundle");

  let chroot = layout.chroot_dir();
  create_dir_with_mode(&chroot, 0o755).map_err(|source| InstallError::CreateDir { path: chroot, source })?;
  if let Some(existing) = paths.iter().find(|p| fs::symlink_metadata(p).is_ok()) {
    return Err(InstallError::AlreadyPresent {
      name: bundle.name,
      path: existing.to_path_buf(),
    });
  }

  if let Err(err) = populate(host, &paths, &bundle, &format, &version) {
    warn!(identity = %id, error = %err, "install failed, rolling back");
    let cleanup = RemoveOptions { skip_post: true };
    if let Err(e) = remove::remove(host, &bundle.url, &bundle.name, RemovalMode::Quiet, &cleanup) {
      warn!(identity = %id, error = %e, "rollback incomplete");
    }
    return Err(err);
  }

  if !options.skip_post {
    postprocess::run(layout)?;
  }

  info!(bundle = %bundle.name, version = %version, "bundle installed");
  Ok(InstallReport {
    identity: id,
    name: bundle.name,
    url: bundle.url,
    version,
  })
}

/// Every step that runs with the bundle's directories in place.
fn populate(
  host: &Host,
  paths: &BundlePaths,
  bundle: &manifest::BundleManifest,
  format: &str,
  version: &str,
) -> Result<(), InstallError> {
  let tools = host.tools();

  for (path, mode) in [(&paths.state_dir, 0o700), (&paths.content_root, 0o755)] {
    create_dir_with_mode(path, mode).map_err(|source| InstallError::CreateDir {
      path: path.clone(),
      source,
    })?;
  }

  manifest::write(&paths.manifest_path, bundle, false).map_err(InstallError::WriteManifest)?;

  let cert_uri = fetch::join_uri(&bundle.url, &format!("{version}/{CERT_BASENAME}"));
  let cert = fetch::fetch_to_file(&cert_uri, &paths.state_dir.join(CERT_BASENAME)).map_err(InstallError::FetchCert)?;

  tools
    .verify_certificate(&cert)
    .map_err(|source| InstallError::Untrusted {
      url: bundle.url.clone(),
      source,
    })?;

  tools
    .add_base_bundles(&bundle.includes)
    .map_err(|source| InstallError::Dependencies {
      includes: bundle.includes.clone(),
      source,
    })?;

  let request = InstallRequest {
    state_dir: &paths.state_dir,
    content_root: &paths.content_root,
    url: &bundle.url,
    format,
    version,
    bundle_name: &bundle.name,
    cert: &cert,
  };
  tools.install_payload(&request).map_err(InstallError::Payload)?;

  if let Err(e) = fs::remove_file(&cert) {
    warn!(path = %cert.display(), error = %e, "unable to delete temporary certificate");
  }
  Ok(())
}
