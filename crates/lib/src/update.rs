//! Update pipeline.
//!
//! Every installed bundle is refreshed in turn. A bundle that cannot be
//! updated is reported and skipped; it never stops the others.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::host::Host;
use crate::identity::BundleId;
use crate::layout::{embedded_cert_path, live_manifest_path};
use crate::manifest::{self, ManifestError};
use crate::postprocess::{self, InstalledBundle, PostProcessError, installed_bundles};
use crate::tools::{ToolError, Tools, UpdateRequest};

#[derive(Debug, Error)]
pub enum UpdateError {
  #[error("unable to determine installed format: {0}")]
  Format(#[source] ToolError),

  #[error("unable to enumerate installed bundles: {0}")]
  Enumerate(#[source] std::io::Error),

  #[error("post-processing after update failed: {0}")]
  PostProcess(#[from] PostProcessError),
}

/// Why one bundle was not updated.
#[derive(Debug, Error)]
pub enum BundleUpdateError {
  #[error("unable to load cached manifest: {0}")]
  CachedManifest(#[source] ManifestError),

  #[error("update agent failed: {0}")]
  Agent(#[source] ToolError),

  #[error("unable to load published manifest: {0}")]
  LiveManifest(#[source] ManifestError),

  #[error("unable to add dependency bundles: {0}")]
  Dependencies(#[source] ToolError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
  pub skip_post: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleFailure {
  pub identity: BundleId,
  pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateReport {
  pub updated: Vec<BundleId>,
  pub failed: Vec<BundleFailure>,
}

/// Update every installed bundle, then republish launchers.
pub fn update_all(host: &Host, options: &UpdateOptions) -> Result<UpdateReport, UpdateError> {
  let layout = host.layout();
  let tools = host.tools();
  let format = tools.installed_format().map_err(UpdateError::Format)?;

  let mut report = UpdateReport::default();
  for bundle in installed_bundles(layout).map_err(UpdateError::Enumerate)? {
    match update_one(&tools, &bundle, &format) {
      Ok(()) => report.updated.push(bundle.id),
      Err(e) => {
        warn!(identity = %bundle.id, error = %e, "bundle not updated");
        report.failed.push(BundleFailure {
          identity: bundle.id,
          reason: e.to_string(),
        });
      }
    }
  }

  info!(updated = report.updated.len(), failed = report.failed.len(), "update pass complete");

  if !options.skip_post {
    postprocess::run(layout)?;
  }
  Ok(report)
}

fn update_one(tools: &Tools<'_>, bundle: &InstalledBundle, format: &str) -> Result<(), BundleUpdateError> {
  let paths = &bundle.paths;
  let cached = manifest::load_path(&paths.manifest_path).map_err(BundleUpdateError::CachedManifest)?;
  info!(bundle = %cached.name, identity = %bundle.id, "updating bundle");

  let cert = embedded_cert_path(&paths.content_root);
  let request = UpdateRequest {
    state_dir: &paths.state_dir,
    content_root: &paths.content_root,
    url: &cached.url,
    format,
    cert: &cert,
  };
  tools.update_payload(&request).map_err(BundleUpdateError::Agent)?;

  let live = manifest::load_path(&live_manifest_path(&paths.content_root)).map_err(BundleUpdateError::LiveManifest)?;

  if !live.same_bundle(&cached) {
    warn!(
      bundle = %cached.name,
      published = %live.name,
      published_url = %live.url,
      "published manifest describes a different bundle, keeping the cached copy"
    );
  } else if live != cached
    && let Err(e) = manifest::write(&paths.manifest_path, &live, true)
  {
    warn!(bundle = %cached.name, error = %e, "unable to refresh cached manifest");
  }

  tools.add_base_bundles(&live.includes).map_err(BundleUpdateError::Dependencies)
}
