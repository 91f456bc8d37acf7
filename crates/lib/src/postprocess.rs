//! Launcher regeneration and the staged swap into the live content tree.
//!
//! Shims are always rebuilt from scratch into `<content>/.bin` and then
//! swapped over `<content>/bin`, so a half-written shim set is never live.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, OpenOptions, ReadDir};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::STAGED_ITEMS;
use crate::identity::BundleId;
use crate::layout::{BundlePaths, HostLayout};
use crate::manifest;
use crate::util::{create_dir_with_mode, remove_path_if_exists};

const LAUNCHER_DIR: &str = "bin";

#[derive(Debug, Error)]
pub enum PostProcessError {
  #[error("unable to enumerate installed bundles in {path}: {source}")]
  Enumerate {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("unable to prepare staging directory {path}: {source}")]
  Staging {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("unable to replace {live} with {staged}: {source}")]
  Swap {
    staged: PathBuf,
    live: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// One entry of the installed-bundle set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBundle {
  pub id: BundleId,
  pub paths: BundlePaths,
}

/// Lazy scan of `<content>/chroot`.
///
/// Dotted names are the sibling manifests and are passed over silently.
/// Anything else that is not an identity-named directory is skipped with a
/// warning.
#[derive(Debug)]
pub struct InstalledBundles {
  layout: HostLayout,
  entries: Option<ReadDir>,
}

impl Iterator for InstalledBundles {
  type Item = InstalledBundle;

  fn next(&mut self) -> Option<Self::Item> {
    let entries = self.entries.as_mut()?;
    for entry in entries {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          warn!(error = %e, "unable to read installed bundle entry, skipping");
          continue;
        }
      };
      let path = entry.path();

      let Some(name) = entry.file_name().to_str().map(str::to_string) else {
        warn!(path = %path.display(), "skipping entry with a non UTF-8 name");
        continue;
      };
      if name.contains('.') {
        continue;
      }

      let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
      if !is_dir {
        warn!(path = %path.display(), "skipping non-directory entry in chroot");
        continue;
      }

      let Some(id) = BundleId::from_dir_name(&name) else {
        warn!(path = %path.display(), "skipping directory that is not a bundle identity");
        continue;
      };

      let paths = self.layout.bundle_paths(&id);
      return Some(InstalledBundle { id, paths });
    }
    None
  }
}

/// Enumerate installed bundles. A missing chroot directory is an empty set.
pub fn installed_bundles(layout: &HostLayout) -> io::Result<InstalledBundles> {
  let chroot = layout.chroot_dir();
  let entries = match fs::read_dir(&chroot) {
    Ok(entries) => Some(entries),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      debug!(path = %chroot.display(), "no chroot directory, nothing installed");
      None
    }
    Err(e) => return Err(e),
  };
  Ok(InstalledBundles {
    layout: layout.clone(),
    entries,
  })
}

/// A shim that made it into the live launcher directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Launcher {
  pub name: String,
  pub bundle: BundleId,
  pub target: PathBuf,
}

#[derive(Debug, Default, Serialize)]
pub struct PostProcessReport {
  pub shims: Vec<Launcher>,
  /// Declared launchers that were not published.
  pub skipped: usize,
}

/// Regenerate every launcher shim and swap the staged items into place.
///
/// A launcher that cannot be written is skipped with a warning; only
/// staging and swap failures abort the run.
pub fn run(layout: &HostLayout) -> Result<PostProcessReport, PostProcessError> {
  run_with(layout, write_shim)
}

fn run_with<W>(layout: &HostLayout, mut write: W) -> Result<PostProcessReport, PostProcessError>
where
  W: FnMut(&Path, &Path, &str) -> io::Result<()>,
{
  let staging = layout.staging_dir(LAUNCHER_DIR);
  let staging_err = |source| PostProcessError::Staging {
    path: staging.clone(),
    source,
  };
  remove_path_if_exists(&staging).map_err(staging_err)?;
  create_dir_with_mode(&staging, 0o755).map_err(staging_err)?;

  // Launcher ownership must not depend on directory order.
  let mut bundles: Vec<InstalledBundle> = installed_bundles(layout)
    .map_err(|source| PostProcessError::Enumerate {
      path: layout.chroot_dir(),
      source,
    })?
    .collect();
  bundles.sort_by(|a, b| a.id.cmp(&b.id));

  let mut report = PostProcessReport::default();
  let mut claimed: HashMap<OsString, BundleId> = HashMap::new();

  for bundle in bundles {
    let manifest = match manifest::load_path(&bundle.paths.manifest_path) {
      Ok(manifest) => manifest,
      Err(e) => {
        warn!(bundle = %bundle.id, error = %e, "unable to load bundle manifest, skipping its launchers");
        continue;
      }
    };

    for bin in &manifest.bin {
      let Some(file_name) = launcher_name(bin) else {
        warn!(bundle = %manifest.name, bin = %bin, "launcher path must stay inside the bundle, skipping");
        report.skipped += 1;
        continue;
      };

      let target = bundle.paths.content_root.join(bin);
      if fs::symlink_metadata(&target).is_err() {
        warn!(bundle = %manifest.name, path = %target.display(), "declared launcher not found, skipping");
        report.skipped += 1;
        continue;
      }

      if let Some(owner) = claimed.get(&file_name) {
        warn!(
          bundle = %manifest.name,
          launcher = %file_name.to_string_lossy(),
          owner = %owner,
          "launcher name already provided by another bundle, skipping"
        );
        report.skipped += 1;
        continue;
      }

      let shim_path = staging.join(&file_name);
      if let Err(e) = write(&shim_path, &bundle.paths.content_root, bin) {
        warn!(bundle = %manifest.name, shim = %shim_path.display(), error = %e, "unable to create launcher, skipping");
        report.skipped += 1;
        continue;
      }
      debug!(shim = %shim_path.display(), target = %target.display(), "staged launcher");

      claimed.insert(file_name.clone(), bundle.id.clone());
      report.shims.push(Launcher {
        name: file_name.to_string_lossy().into_owned(),
        bundle: bundle.id.clone(),
        target,
      });
    }
  }

  swap_staged(layout)?;

  info!(shims = report.shims.len(), skipped = report.skipped, "post-processing complete");
  Ok(report)
}

/// Replace each live item with its staged counterpart.
fn swap_staged(layout: &HostLayout) -> Result<(), PostProcessError> {
  for item in STAGED_ITEMS {
    let staged = layout.staging_dir(item);
    if fs::symlink_metadata(&staged).is_err() {
      continue;
    }
    let live = layout.live_dir(item);
    let swap_err = |source| PostProcessError::Swap {
      staged: staged.clone(),
      live: live.clone(),
      source,
    };

    remove_path_if_exists(&live).map_err(swap_err)?;
    fs::rename(&staged, &live).map_err(swap_err)?;
    debug!(live = %live.display(), "swapped staged item into place");
  }
  Ok(())
}

/// File name a launcher is published under, or `None` if `bin` would
/// escape the bundle root.
fn launcher_name(bin: &str) -> Option<OsString> {
  let path = Path::new(bin);
  let escapes = path
    .components()
    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
  if escapes {
    return None;
  }
  path.file_name().map(|name| name.to_os_string())
}

fn write_shim(path: &Path, bundle_root: &Path, bin: &str) -> io::Result<()> {
  let script = shim_script(bundle_root, bin);

  let mut options = OpenOptions::new();
  options.write(true).create(true).truncate(true);
  #[cfg(unix)]
  {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o755);
  }

  options.open(path)?.write_all(&script)
}

/// The launcher script for `<bundle_root>/<bin>`.
///
/// The bundle's own directories are prepended to whatever `PATH` and
/// `LD_LIBRARY_PATH` the caller has when the shim runs. An unset or empty
/// variable contributes nothing, so no empty search entry appears.
pub fn shim_script(bundle_root: &Path, bin: &str) -> Vec<u8> {
  let root = path_bytes(bundle_root);
  let joined = |suffix: &str| {
    let mut full = root.to_vec();
    if !full.ends_with(b"/") {
      full.push(b'/');
    }
    full.extend_from_slice(suffix.as_bytes());
    full
  };

  let mut script = b"#!/bin/sh\n".to_vec();
  script.extend_from_slice(b"export PATH=");
  script.extend(shell_quote(&joined("usr/bin")));
  script.extend_from_slice(b"\"${PATH:+:$PATH}\"\n");
  script.extend_from_slice(b"export LD_LIBRARY_PATH=");
  script.extend(shell_quote(&joined("usr/lib64")));
  script.extend_from_slice(b"\"${LD_LIBRARY_PATH:+:$LD_LIBRARY_PATH}\"\n");
  script.extend_from_slice(b"exec ");
  script.extend(shell_quote(&joined(bin.trim_start_matches("./"))));
  script.extend_from_slice(b" \"$@\"\n");
  script
}

/// Single-quote `raw` for POSIX sh.
pub fn shell_quote(raw: &[u8]) -> Vec<u8> {
  let mut quoted = Vec::with_capacity(raw.len() + 2);
  quoted.push(b'\'');
  for &byte in raw {
    if byte == b'\'' {
      quoted.extend_from_slice(b"'\\''");
    } else {
      quoted.push(byte);
    }
  }
  quoted.push(b'\'');
  quoted
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
  use std::os::unix::ffi::OsStrExt;
  Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
  match path.to_string_lossy() {
    Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
    Cow::Owned(s) => Cow::Owned(s.into_bytes()),
  }
}
