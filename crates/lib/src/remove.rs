//! Removal pipeline.
//!
//! Deletes the three locations a bundle owns, each independently, so one
//! failing deletion never keeps the others from happening. The same code
//! path serves operator-requested removal and install rollback; the
//! [`RemovalMode`] selects which.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::host::Host;
use crate::identity::{BundleId, resolve_identity};
use crate::layout::HostLayout;
use crate::postprocess::{self, PostProcessError};
use crate::util::remove_path;

#[derive(Debug, Error)]
pub enum RemoveError {
  #[error("post-processing after removal failed: {0}")]
  PostProcess(#[from] PostProcessError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
  /// Operator-requested removal: missing paths are reported, and launchers
  /// are republished afterward unless skipped.
  Interactive,
  /// Rollback of a failed install: missing paths are expected, and
  /// post-processing never runs.
  Quiet,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
  pub skip_post: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
  Removed,
  Missing,
  Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalTarget {
  pub path: PathBuf,
  pub outcome: RemovalOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalReport {
  pub identity: BundleId,
  pub targets: Vec<RemovalTarget>,
}

impl RemovalReport {
  pub fn removed(&self) -> usize {
    self
      .targets
      .iter()
      .filter(|t| t.outcome == RemovalOutcome::Removed)
      .count()
  }

  pub fn failed(&self) -> usize {
    self
      .targets
      .iter()
      .filter(|t| matches!(t.outcome, RemovalOutcome::Failed(_)))
      .count()
  }
}

/// Remove the bundle `(url, name)` from `host`.
pub fn remove(
  host: &Host,
  url: &str,
  name: &str,
  mode: RemovalMode,
  options: &RemoveOptions,
) -> Result<RemovalReport, RemoveError> {
  let report = remove_paths(host.layout(), &resolve_identity(url, name), mode);
  info!(
    bundle = %name,
    identity = %report.identity,
    removed = report.removed(),
    failed = report.failed(),
    "bundle removed"
  );

  if mode == RemovalMode::Interactive && !options.skip_post {
    postprocess::run(host.layout())?;
  }
  Ok(report)
}

/// Best-effort deletion of every location owned by `id`.
fn remove_paths(layout: &HostLayout, id: &BundleId, mode: RemovalMode) -> RemovalReport {
  let paths = layout.bundle_paths(id);
  let targets = paths
    .iter()
    .map(|path| {
      let outcome = match remove_path(path) {
        Ok(()) => {
          debug!(path = %path.display(), "removed");
          RemovalOutcome::Removed
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
          if mode == RemovalMode::Interactive {
            warn!(path = %path.display(), "nothing to remove");
          }
          RemovalOutcome::Missing
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "failed to remove");
          RemovalOutcome::Failed(e.to_string())
        }
      };
      RemovalTarget {
        path: path.to_path_buf(),
        outcome,
      }
    })
    .collect();

  RemovalReport {
    identity: id.clone(),
    targets,
  }
}
