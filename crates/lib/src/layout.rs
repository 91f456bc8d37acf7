//! On-disk layout of the state and content trees.
//!
//! ```text
//! <state>/3rd-party.lock
//! <state>/3rd-party/<id>/                 transient per-bundle state
//! <content>/chroot/<id>/                  installed payload
//! <content>/chroot/<id>.toml              cached manifest (sibling, not child)
//! <content>/.bin/                         staged launcher shims
//! <content>/bin/                          live launcher shims
//! ```

use std::path::{Path, PathBuf};

use crate::consts::{
  BUNDLES_STATE_DIRNAME, CERT_BASENAME, CHROOT_DIRNAME, LOCK_FILENAME, MANIFEST_BASENAME, MANIFEST_EXTENSION,
};
use crate::identity::BundleId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
  state_root: PathBuf,
  content_root: PathBuf,
}

/// The three locations owned by one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePaths {
  pub state_dir: PathBuf,
  pub content_root: PathBuf,
  pub manifest_path: PathBuf,
}

impl BundlePaths {
  pub fn iter(&self) -> impl Iterator<Item = &Path> {
    [self.state_dir.as_path(), self.content_root.as_path(), self.manifest_path.as_path()].into_iter()
  }
}

impl HostLayout {
  pub fn new(state_root: impl Into<PathBuf>, content_root: impl Into<PathBuf>) -> Self {
    Self {
      state_root: state_root.into(),
      content_root: content_root.into(),
    }
  }

  pub fn state_root(&self) -> &Path {
    &self.state_root
  }

  pub fn content_root(&self) -> &Path {
    &self.content_root
  }

  pub fn lock_path(&self) -> PathBuf {
    self.state_root.join(LOCK_FILENAME)
  }

  pub fn bundles_state_dir(&self) -> PathBuf {
    self.state_root.join(BUNDLES_STATE_DIRNAME)
  }

  pub fn bundle_state_dir(&self, id: &BundleId) -> PathBuf {
    self.bundles_state_dir().join(id.as_str())
  }

  pub fn chroot_dir(&self) -> PathBuf {
    self.content_root.join(CHROOT_DIRNAME)
  }

  pub fn bundle_content_root(&self, id: &BundleId) -> PathBuf {
    self.chroot_dir().join(id.as_str())
  }

  pub fn bundle_manifest_path(&self, id: &BundleId) -> PathBuf {
    self
      .chroot_dir()
      .join(format!("{}.{}", id.as_str(), MANIFEST_EXTENSION))
  }

  pub fn bundle_paths(&self, id: &BundleId) -> BundlePaths {
    BundlePaths {
      state_dir: self.bundle_state_dir(id),
      content_root: self.bundle_content_root(id),
      manifest_path: self.bundle_manifest_path(id),
    }
  }

  /// Live location of a staged top-level item, e.g. `<content>/bin`.
  pub fn live_dir(&self, item: &str) -> PathBuf {
    self.content_root.join(item)
  }

  /// Staging location of a top-level item, e.g. `<content>/.bin`.
  pub fn staging_dir(&self, item: &str) -> PathBuf {
    self.content_root.join(format!(".{item}"))
  }
}

/// Manifest a bundle publishes inside its own installed tree.
pub fn live_manifest_path(bundle_content_root: &Path) -> PathBuf {
  bundle_content_root.join("usr").join(MANIFEST_BASENAME)
}

/// Root certificate shipped inside an installed payload.
pub fn embedded_cert_path(bundle_content_root: &Path) -> PathBuf {
  bundle_content_root
    .join("usr")
    .join("share")
    .join("clear")
    .join("update-ca")
    .join(CERT_BASENAME)
}
