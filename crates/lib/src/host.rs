//! Lock-holding session over one state/content root pair.
//!
//! Every pipeline takes a `&Host`, so nothing can touch the trees without
//! first holding the host lock. The lock is released when the `Host` drops.

use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, HostConfig};
use crate::layout::HostLayout;
use crate::lock::{HostLock, HostLockError};
use crate::tools::Tools;

#[derive(Debug, Error)]
pub enum HostError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Lock(#[from] HostLockError),
}

#[derive(Debug)]
pub struct Host {
  config: HostConfig,
  layout: HostLayout,
  lock: HostLock,
}

impl Host {
  /// Validate `config` and take the host lock on its state root.
  ///
  /// `command` is recorded in the lock metadata so a contending invocation
  /// can say who holds it.
  pub fn open(config: HostConfig, command: &str) -> Result<Self, HostError> {
    config.validate()?;
    let lock = HostLock::acquire(&config.state_root, command)?;
    let layout = config.layout();
    debug!(
      state = %config.state_root.display(),
      content = %config.content_root.display(),
      command,
      "opened host"
    );
    Ok(Self { config, layout, lock })
  }

  pub fn config(&self) -> &HostConfig {
    &self.config
  }

  pub fn layout(&self) -> &HostLayout {
    &self.layout
  }

  pub fn tools(&self) -> Tools<'_> {
    Tools::new(&self.config.tools)
  }

  pub fn lock(&self) -> &HostLock {
    &self.lock
  }
}
