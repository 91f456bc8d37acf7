//! Shared utilities.
//!
//! Filesystem helpers used by the pipelines, plus test helpers.

use std::fs;
use std::io;
use std::path::Path;

#[cfg(test)]
pub mod testutil;

/// Remove a file or a whole directory tree, whichever `path` is.
///
/// Symlinks are removed, never followed.
pub fn remove_path(path: &Path) -> io::Result<()> {
  let metadata = fs::symlink_metadata(path)?;
  if metadata.is_dir() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  }
}

/// Like [`remove_path`], but a missing path is success.
pub fn remove_path_if_exists(path: &Path) -> io::Result<()> {
  match remove_path(path) {
    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
    other => other,
  }
}

/// Create `path` and its parents with the given unix mode on the leaf.
pub fn create_dir_with_mode(path: &Path, mode: u32) -> io::Result<()> {
  let mut builder = fs::DirBuilder::new();
  builder.recursive(true);
  #[cfg(unix)]
  {
    use std::os::unix::fs::DirBuilderExt;
    builder.mode(mode);
  }
  #[cfg(not(unix))]
  let _ = mode;
  builder.create(path)
}
