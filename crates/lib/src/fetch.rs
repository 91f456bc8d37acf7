//! Plain byte retrieval from a local path, a `file://` URI, or HTTP(S).
//!
//! No integrity checking happens here: manifests are trusted by origin and
//! certificates are handed to the external trust verifier afterwards.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("invalid URI ({uri}): {message}")]
  InvalidUri { uri: String, message: String },

  #[error("unable to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("unable to fetch {uri}: {message}")]
  Http { uri: String, message: String },

  #[error("unable to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Where a URI points once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
  Local(PathBuf),
  Remote(Url),
}

impl Source {
  pub fn parse(uri: &str) -> Result<Self, FetchError> {
    if Path::new(uri).is_absolute() {
      return Ok(Self::Local(PathBuf::from(uri)));
    }

    let url = Url::parse(uri).map_err(|e| FetchError::InvalidUri {
      uri: uri.to_string(),
      message: e.to_string(),
    })?;

    match url.scheme() {
      "file" => url.to_file_path().map(Self::Local).map_err(|()| FetchError::InvalidUri {
        uri: uri.to_string(),
        message: "file URI does not name a local path".to_string(),
      }),
      "http" | "https" => Ok(Self::Remote(url)),
      other => Err(FetchError::InvalidUri {
        uri: uri.to_string(),
        message: format!("unsupported scheme '{other}'"),
      }),
    }
  }
}

/// Fetch the full body behind `uri`.
pub fn fetch_bytes(uri: &str) -> Result<Vec<u8>, FetchError> {
  match Source::parse(uri)? {
    Source::Local(path) => {
      debug!(path = %path.display(), "reading local source");
      fs::read(&path).map_err(|source| FetchError::Read { path, source })
    }
    Source::Remote(url) => {
      info!(url = %url, "fetching");
      let http_err = |message: String| FetchError::Http {
        uri: uri.to_string(),
        message,
      };
      let response = reqwest::blocking::get(url).map_err(|e| http_err(e.to_string()))?;
      if !response.status().is_success() {
        return Err(http_err(format!("HTTP {}", response.status())));
      }
      let bytes = response.bytes().map_err(|e| http_err(e.to_string()))?;
      debug!(size = bytes.len(), "fetch complete");
      Ok(bytes.to_vec())
    }
  }
}

/// Fetch `uri` into `dest`, replacing any existing file.
pub fn fetch_to_file(uri: &str, dest: &Path) -> Result<PathBuf, FetchError> {
  let bytes = fetch_bytes(uri)?;
  fs::write(dest, bytes).map_err(|source| FetchError::Write {
    path: dest.to_path_buf(),
    source,
  })?;
  Ok(dest.to_path_buf())
}

/// Join a relative path onto an origin URI with a single separator.
pub fn join_uri(base: &str, suffix: &str) -> String {
  format!("{}/{}", base.trim_end_matches('/'), suffix.trim_start_matches('/'))
}
