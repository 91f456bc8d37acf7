//! Bundle identity derivation.
//!
//! A bundle is addressed on disk by a key derived from its origin URL and
//! name. Both inputs are arbitrary strings (URLs carry slashes, names may
//! carry anything), so the key is a digest rather than an encoding of them.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Filesystem-safe identity of an installed bundle.
///
/// Always 64 lowercase hex characters: no separators, no NUL and no `.`,
/// which keeps it distinguishable from the dotted sibling manifest names
/// during directory enumeration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BundleId(String);

impl BundleId {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Accepts a directory entry name as an identity if it has the derived shape.
  pub fn from_dir_name(name: &str) -> Option<Self> {
    let well_formed = name.len() == 64 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    well_formed.then(|| Self(name.to_string()))
  }
}

impl fmt::Display for BundleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for BundleId {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

/// Derive the identity for `(url, name)`.
///
/// Each field is length-prefixed before hashing so that moving bytes from
/// one field to the other always changes the digest input.
pub fn resolve_identity(url: &str, name: &str) -> BundleId {
  let mut hasher = Sha256::new();
  for field in [url, name] {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
  }
  BundleId(hex::encode(hasher.finalize()))
}
