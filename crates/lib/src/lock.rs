//! Host-wide exclusive lock over the bundle state root.
//!
//! One lock covers the whole state root, so operations against different
//! bundles on the same host are serialized too. A second invocation fails
//! immediately instead of waiting.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::LOCK_FILENAME;
use crate::util::create_dir_with_mode;

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub state_root: PathBuf,
}

#[derive(Debug, Error)]
pub enum HostLockError {
  #[error("state directory path ({0}) is not absolute")]
  RelativePath(PathBuf),

  #[error(
    "State root is locked by another process: {command} (PID {pid}, started {started_at})\n\
             If you're sure no other instance is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    command: String,
    pid: u32,
    started_at: String,
    lock_path: PathBuf,
  },

  #[error(
    "State root is locked (could not read lock metadata)\n\
             If you're sure no other instance is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("Unable to create statedir ({path}): {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Lockfile ({path}) open failed: {source}")]
  OpenFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Failed to write lock metadata to {path}: {source}")]
  WriteMetadata {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Unable to set lock on {path}: {source}")]
  LockFailed {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Scoped lock handle. Dropping it releases the lock.
#[derive(Debug)]
pub struct HostLock {
  file: Option<File>,
  lock_path: PathBuf,
}

impl HostLock {
  pub fn acquire(state_root: &Path, command: &str) -> Result<Self, HostLockError> {
    if !state_root.is_absolute() {
      return Err(HostLockError::RelativePath(state_root.to_path_buf()));
    }

    let lock_path = state_root.join(LOCK_FILENAME);

    if !state_root.exists() {
      create_dir_with_mode(state_root, 0o700).map_err(|source| HostLockError::CreateDir {
        path: state_root.to_path_buf(),
        source,
      })?;
    }

    let file = open_lock_file(&lock_path).map_err(|source| HostLockError::OpenFile {
      path: lock_path.clone(),
      source,
    })?;

    if let Err(err) = try_lock_exclusive(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(Self::read_contention_error(&lock_path));
      }
      return Err(HostLockError::LockFailed { path: lock_path, source: err });
    }

    Self::write_metadata(&file, command, state_root, &lock_path)?;
    debug!(path = %lock_path.display(), "acquired host lock");

    Ok(Self {
      file: Some(file),
      lock_path,
    })
  }

  /// Releases the lock if still held. Safe to call repeatedly.
  pub fn release(&mut self) {
    if let Some(file) = self.file.take() {
      // Closing the descriptor drops the flock.
      drop(file);
      debug!(path = %self.lock_path.display(), "released host lock");
    }
  }

  pub fn is_held(&self) -> bool {
    self.file.is_some()
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  /// Reads the lock metadata through the held handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let Some(mut file) = self.file.as_ref() else {
      return Err(io::Error::new(io::ErrorKind::NotFound, "lock not held"));
    };
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  fn write_metadata(file: &File, command: &str, state_root: &Path, lock_path: &Path) -> Result<(), HostLockError> {
    let metadata = LockMetadata {
      version: 1,
      pid: std::process::id(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      command: command.to_string(),
      state_root: state_root.to_path_buf(),
    };
    let write_err = |source| HostLockError::WriteMetadata {
      path: lock_path.to_path_buf(),
      source,
    };

    file.set_len(0).map_err(write_err)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| write_err(io::Error::other(e)))?;
    writer.flush().map_err(write_err)?;

    Ok(())
  }

  fn read_contention_error(lock_path: &Path) -> HostLockError {
    if let Ok(mut file) = File::open(lock_path) {
      let mut contents = String::new();
      if file.read_to_string(&mut contents).is_ok()
        && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
      {
        return HostLockError::Contention {
          command: metadata.command,
          pid: metadata.pid,
          started_at: format!("Unix timestamp {}", metadata.started_at_unix),
          lock_path: lock_path.to_path_buf(),
        };
      }
    }

    HostLockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    }
  }
}

impl Drop for HostLock {
  fn drop(&mut self) {
    self.release();
  }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
  let mut options = OpenOptions::new();
  options.read(true).write(true).create(true).truncate(false);
  #[cfg(unix)]
  {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600);
  }
  options.open(path)
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
    .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<()> {
  Err(io::Error::new(
    io::ErrorKind::Unsupported,
    "host locking requires a unix platform",
  ))
}
