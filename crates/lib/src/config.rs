//! Host configuration: the two managed roots and the external programs.
//!
//! Every location has a compiled-in default and an environment override so
//! tests and non-standard hosts can point the manager elsewhere.

use std::path::PathBuf;

use thiserror::Error;

use crate::consts::{
  DEFAULT_CONTENT_DIR, DEFAULT_FORMAT_FILE, DEFAULT_STATE_DIR, DEFAULT_TRUST_VERIFIER, DEFAULT_UPDATE_AGENT,
  ENV_BUNDLE_INSTALLER, ENV_CONTENT_DIR, ENV_FORMAT_FILE, ENV_STATE_DIR, ENV_TRUST_VERIFIER, ENV_UPDATE_AGENT,
};
use crate::layout::HostLayout;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("state directory path ({0}) is not absolute")]
  RelativeStateDir(PathBuf),

  #[error("content directory path ({0}) is not absolute")]
  RelativeContentDir(PathBuf),
}

/// External programs the pipelines sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
  /// Queried for versions, and runs payload install and update.
  pub update_agent: PathBuf,
  /// Adds dependency bundles to the base system.
  pub bundle_installer: PathBuf,
  /// Invoked as `<verifier> verify <cert>`.
  pub trust_verifier: PathBuf,
  /// Holds the installed-format version of the base system.
  pub format_file: PathBuf,
}

impl Default for Toolchain {
  fn default() -> Self {
    Self {
      update_agent: PathBuf::from(DEFAULT_UPDATE_AGENT),
      bundle_installer: PathBuf::from(DEFAULT_UPDATE_AGENT),
      trust_verifier: PathBuf::from(DEFAULT_TRUST_VERIFIER),
      format_file: PathBuf::from(DEFAULT_FORMAT_FILE),
    }
  }
}

impl Toolchain {
  /// Defaults with `TPB_*` environment overrides applied.
  ///
  /// The bundle installer falls back to the update agent, since on a stock
  /// host both are the same program.
  pub fn from_env() -> Self {
    let update_agent = env_path(ENV_UPDATE_AGENT).unwrap_or_else(|| PathBuf::from(DEFAULT_UPDATE_AGENT));
    Self {
      bundle_installer: env_path(ENV_BUNDLE_INSTALLER).unwrap_or_else(|| update_agent.clone()),
      update_agent,
      trust_verifier: env_path(ENV_TRUST_VERIFIER).unwrap_or_else(|| PathBuf::from(DEFAULT_TRUST_VERIFIER)),
      format_file: env_path(ENV_FORMAT_FILE).unwrap_or_else(|| PathBuf::from(DEFAULT_FORMAT_FILE)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
  pub state_root: PathBuf,
  pub content_root: PathBuf,
  pub tools: Toolchain,
}

impl HostConfig {
  pub fn new(state_root: impl Into<PathBuf>, content_root: impl Into<PathBuf>, tools: Toolchain) -> Self {
    Self {
      state_root: state_root.into(),
      content_root: content_root.into(),
      tools,
    }
  }

  /// Roots from `TPB_STATE_DIR` / `TPB_CONTENT_DIR` or the stock locations.
  pub fn from_env() -> Self {
    Self {
      state_root: default_state_dir(),
      content_root: default_content_dir(),
      tools: Toolchain::from_env(),
    }
  }

  /// Both roots must be absolute: every derived path is handed to
  /// subprocesses that run with an unrelated working directory.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.state_root.is_absolute() {
      return Err(ConfigError::RelativeStateDir(self.state_root.clone()));
    }
    if !self.content_root.is_absolute() {
      return Err(ConfigError::RelativeContentDir(self.content_root.clone()));
    }
    Ok(())
  }

  pub fn layout(&self) -> HostLayout {
    HostLayout::new(&self.state_root, &self.content_root)
  }
}

pub fn default_state_dir() -> PathBuf {
  env_path(ENV_STATE_DIR).unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
}

pub fn default_content_dir() -> PathBuf {
  env_path(ENV_CONTENT_DIR).unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR))
}

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|value| !value.is_empty()).map(PathBuf::from)
}
