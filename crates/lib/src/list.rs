//! Read-only listing of installed bundles.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::host::Host;
use crate::identity::BundleId;
use crate::layout::live_manifest_path;
use crate::manifest;
use crate::postprocess::installed_bundles;

#[derive(Debug, Error)]
pub enum ListError {
  #[error("unable to enumerate installed bundles: {0}")]
  Enumerate(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleListing {
  pub identity: BundleId,
  pub name: String,
  pub description: String,
  pub url: String,
  pub bin: Vec<String>,
  /// Dependencies as currently declared by the installed payload.
  pub includes: Vec<String>,
}

/// Describe every installed bundle whose cached and published manifests
/// both load. Others are skipped with a warning.
pub fn list(host: &Host) -> Result<Vec<BundleListing>, ListError> {
  let mut listings = Vec::new();

  for bundle in installed_bundles(host.layout()).map_err(ListError::Enumerate)? {
    let cached = match manifest::load_path(&bundle.paths.manifest_path) {
      Ok(m) => m,
      Err(e) => {
        warn!(identity = %bundle.id, error = %e, "unable to load cached manifest, skipping");
        continue;
      }
    };
    let live = match manifest::load_path(&live_manifest_path(&bundle.paths.content_root)) {
      Ok(m) => m,
      Err(e) => {
        warn!(bundle = %cached.name, error = %e, "unable to load published manifest, skipping");
        continue;
      }
    };

    listings.push(BundleListing {
      identity: bundle.id,
      name: cached.name,
      description: cached.description,
      url: cached.url,
      bin: cached.bin,
      includes: live.includes,
    });
  }

  listings.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.url.cmp(&b.url)));
  Ok(listings)
}
