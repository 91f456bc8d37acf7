//! External programs: the update agent, the trust verifier and the
//! base-system bundle installer.
//!
//! Every invocation runs to completion with both output streams captured
//! before anything is inspected. There is no timeout.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Toolchain;

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("unable to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("{program} exited with {code}: {output}")]
  Failed {
    program: String,
    code: String,
    output: String,
  },

  #[error("unable to read installed format from {path}: {source}")]
  Format {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("installed format file {0} is empty")]
  EmptyFormat(PathBuf),

  #[error("unable to parse latest version from update agent output: {0}")]
  Version(#[from] VersionParseError),
}

/// The agent's version report did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
  #[error("expected two ':'-delimited fields, found {found}")]
  MissingSeparator { found: usize },

  #[error("no version after the second ':'")]
  MissingValue,
}

/// Extract the latest server version from the agent's status text.
///
/// The report looks like:
///
/// ```text
/// Current OS version: 30
/// Latest server version: 40
/// ```
///
/// The token is the first whitespace-delimited word after the second colon.
/// Any further status lines the agent prints are ignored.
pub fn parse_latest_version(raw: &str) -> Result<String, VersionParseError> {
  let mut parts = raw.splitn(3, ':');
  let _current = parts.next();
  let _latest_label = parts.next().ok_or(VersionParseError::MissingSeparator { found: 0 })?;
  let rest = parts.next().ok_or(VersionParseError::MissingSeparator { found: 1 })?;

  let version = rest.split_whitespace().next().ok_or(VersionParseError::MissingValue)?;
  Ok(version.to_string())
}

/// Captured result of one subprocess run.
#[derive(Debug)]
pub struct ToolOutput {
  pub status: ExitStatus,
  pub stdout: String,
  pub stderr: String,
}

impl ToolOutput {
  /// Stdout followed by stderr.
  pub fn combined(&self) -> String {
    let mut combined = self.stdout.clone();
    combined.push_str(&self.stderr);
    combined
  }
}

fn program_name(program: &Path) -> String {
  program.display().to_string()
}

fn exit_code(status: ExitStatus) -> String {
  status
    .code()
    .map(|code| format!("status {code}"))
    .unwrap_or_else(|| "a signal".to_string())
}

/// Run `program` with `args`, capturing everything. A non-zero exit is not
/// an error at this level.
fn capture<I, S>(program: &Path, args: I) -> Result<ToolOutput, ToolError>
where
  I: IntoIterator<Item = S>,
  S: AsRef<OsStr>,
{
  let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
  debug!(program = %program.display(), args = ?args, "spawning process");

  let output = Command::new(program)
    .args(&args)
    .output()
    .map_err(|source| ToolError::Spawn {
      program: program_name(program),
      source,
    })?;

  let captured = ToolOutput {
    status: output.status,
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  };
  if !captured.stdout.is_empty() {
    debug!(stdout = %captured.stdout, "command stdout");
  }
  if !captured.stderr.is_empty() {
    debug!(stderr = %captured.stderr, "command stderr");
  }
  Ok(captured)
}

/// Like [`capture`], but a non-zero exit is a [`ToolError::Failed`] carrying
/// the combined output.
fn run_checked<I, S>(program: &Path, args: I) -> Result<ToolOutput, ToolError>
where
  I: IntoIterator<Item = S>,
  S: AsRef<OsStr>,
{
  let output = capture(program, args)?;
  if !output.status.success() {
    return Err(ToolError::Failed {
      program: program_name(program),
      code: exit_code(output.status),
      output: output.combined(),
    });
  }
  Ok(output)
}

/// Payload installation request for the update agent.
#[derive(Debug, Clone)]
pub struct InstallRequest<'a> {
  pub state_dir: &'a Path,
  pub content_root: &'a Path,
  pub url: &'a str,
  pub format: &'a str,
  pub version: &'a str,
  pub bundle_name: &'a str,
  pub cert: &'a Path,
}

impl InstallRequest<'_> {
  /// `-b` and `-N` forbid bundle scripts and boot-file updates: payload
  /// content must never execute as part of installation.
  pub fn args(&self) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["verify", "-f", "-b", "-N", "-S"].map(OsString::from).to_vec();
    args.push(self.state_dir.into());
    args.push("-p".into());
    args.push(self.content_root.into());
    args.extend(
      [
        "-u",
        self.url,
        "-F",
        self.format,
        "-m",
        self.version,
        "-x",
        "-B",
        self.bundle_name,
        "-C",
      ]
      .map(OsString::from),
    );
    args.push(self.cert.into());
    args
  }
}

/// Payload refresh request for the update agent.
#[derive(Debug, Clone)]
pub struct UpdateRequest<'a> {
  pub state_dir: &'a Path,
  pub content_root: &'a Path,
  pub url: &'a str,
  pub format: &'a str,
  pub cert: &'a Path,
}

impl UpdateRequest<'_> {
  /// Same script restrictions as [`InstallRequest::args`].
  pub fn args(&self) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["update", "-b", "-N", "-F", self.format, "-S"].map(OsString::from).to_vec();
    args.push(self.state_dir.into());
    args.push("-p".into());
    args.push(self.content_root.into());
    args.extend(["-u", self.url, "-C"].map(OsString::from));
    args.push(self.cert.into());
    args
  }
}

/// Handle on the configured external programs.
#[derive(Debug, Clone)]
pub struct Tools<'a> {
  toolchain: &'a Toolchain,
}

impl<'a> Tools<'a> {
  pub fn new(toolchain: &'a Toolchain) -> Self {
    Self { toolchain }
  }

  /// Installed-format version of the base system.
  pub fn installed_format(&self) -> Result<String, ToolError> {
    let path = &self.toolchain.format_file;
    let raw = fs::read_to_string(path).map_err(|source| ToolError::Format {
      path: path.clone(),
      source,
    })?;
    let format = raw.trim();
    if format.is_empty() {
      return Err(ToolError::EmptyFormat(path.clone()));
    }
    Ok(format.to_string())
  }

  /// Ask the update agent for the latest version published at `uri`.
  ///
  /// The agent exits non-zero when the host itself is not up to date, so
  /// only a launch failure is treated as an error; the status text on stderr
  /// is parsed either way.
  pub fn latest_version(&self, uri: &str, state_root: &Path) -> Result<String, ToolError> {
    let mut args: Vec<OsString> = vec!["update".into(), "-S".into(), state_root.into()];
    args.extend(["-s", "-u", uri].map(OsString::from));

    let output = capture(&self.toolchain.update_agent, args)?;
    let version = parse_latest_version(&output.stderr)?;
    info!(uri = %uri, version = %version, "resolved latest version");
    Ok(version)
  }

  pub fn install_payload(&self, request: &InstallRequest<'_>) -> Result<(), ToolError> {
    info!(bundle = %request.bundle_name, url = %request.url, "installing payload");
    run_checked(&self.toolchain.update_agent, request.args()).map(drop)
  }

  pub fn update_payload(&self, request: &UpdateRequest<'_>) -> Result<(), ToolError> {
    info!(url = %request.url, root = %request.content_root.display(), "updating payload");
    run_checked(&self.toolchain.update_agent, request.args()).map(drop)
  }

  /// Exit status zero means the certificate chains to a trusted root.
  pub fn verify_certificate(&self, cert: &Path) -> Result<(), ToolError> {
    let args: Vec<OsString> = vec!["verify".into(), cert.into()];
    run_checked(&self.toolchain.trust_verifier, args).map(drop)
  }

  /// Install base-system dependency bundles, one argument per bundle.
  pub fn add_base_bundles(&self, bundles: &[String]) -> Result<(), ToolError> {
    if bundles.is_empty() {
      return Ok(());
    }
    info!(bundles = ?bundles, "adding dependency bundles to the base system");
    let args = std::iter::once("bundle-add").chain(bundles.iter().map(String::as_str));
    run_checked(&self.toolchain.bundle_installer, args).map(drop)
  }
}
