//! Bundle manifest codec.
//!
//! A manifest is a TOML document with a single `[bundle]` table:
//!
//! ```toml
//! [bundle]
//! name = "tool"
//! description = "An example tool"
//! url = "https://example.test/bundle"
//! includes = ["editors"]
//! bin = ["usr/bin/tool"]
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::{self, FetchError};
use crate::identity::{BundleId, resolve_identity};

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("manifest is not valid UTF-8")]
  Encoding(#[source] std::string::FromUtf8Error),

  #[error("failed to parse manifest: {0}")]
  Parse(#[source] toml::de::Error),

  #[error("failed to serialize manifest: {0}")]
  Serialize(#[source] toml::ser::Error),

  #[error("manifest {0} already exists")]
  AlreadyExists(PathBuf),

  #[error("failed to write manifest {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
  #[serde(alias = "Name")]
  pub name: String,

  #[serde(default, alias = "Description")]
  pub description: String,

  #[serde(alias = "URL", alias = "Url")]
  pub url: String,

  /// Base-system bundles this bundle depends on.
  #[serde(default, alias = "Includes")]
  pub includes: Vec<String>,

  /// Launcher executables, relative to the installed root.
  #[serde(default, alias = "Bin")]
  pub bin: Vec<String>,
}

impl BundleManifest {
  pub fn identity(&self) -> BundleId {
    resolve_identity(&self.url, &self.name)
  }

  /// True when `other` describes the same `(url, name)` pair.
  pub fn same_bundle(&self, other: &BundleManifest) -> bool {
    self.url == other.url && self.name == other.name
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ManifestDocument {
  #[serde(alias = "Bundle")]
  bundle: BundleManifest,
}

pub fn decode(bytes: &[u8]) -> Result<BundleManifest, ManifestError> {
  let text = String::from_utf8(bytes.to_vec()).map_err(ManifestError::Encoding)?;
  let document: ManifestDocument = toml::from_str(&text).map_err(ManifestError::Parse)?;
  Ok(document.bundle)
}

pub fn encode(manifest: &BundleManifest) -> Result<String, ManifestError> {
  let document = ManifestDocument {
    bundle: manifest.clone(),
  };
  toml::to_string(&document).map_err(ManifestError::Serialize)
}

/// Load a manifest from a local path, `file://` URI, or HTTP(S) URI.
pub fn load(uri: &str) -> Result<BundleManifest, ManifestError> {
  decode(&fetch::fetch_bytes(uri)?)
}

pub fn load_path(path: &Path) -> Result<BundleManifest, ManifestError> {
  let bytes = fs::read(path).map_err(|source| FetchError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  decode(&bytes)
}

/// Write `manifest` to `path`. Without `overwrite` an existing file is an error.
pub fn write(path: &Path, manifest: &BundleManifest, overwrite: bool) -> Result<(), ManifestError> {
  let encoded = encode(manifest)?;

  let mut options = OpenOptions::new();
  options.write(true);
  if overwrite {
    options.create(true).truncate(true);
  } else {
    options.create_new(true);
  }

  let mut file = options.open(path).map_err(|source| {
    if source.kind() == io::ErrorKind::AlreadyExists {
      ManifestError::AlreadyExists(path.to_path_buf())
    } else {
      ManifestError::Write {
        path: path.to_path_buf(),
        source,
      }
    }
  })?;

  file
    .write_all(encoded.as_bytes())
    .and_then(|()| file.flush())
    .map_err(|source| ManifestError::Write {
      path: path.to_path_buf(),
      source,
    })
}
