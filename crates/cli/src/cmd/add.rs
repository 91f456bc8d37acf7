//! Implementation of the `tpb add` command.

use anyhow::{Context, Result};

use tpb_lib::config::HostConfig;
use tpb_lib::host::Host;
use tpb_lib::install::{InstallOptions, add};

use crate::output::{print_stat, print_success, short_id};

/// Install the bundle published at `uri`.
///
/// A failed install has already been rolled back by the time the error
/// reaches here.
pub fn cmd_add(config: HostConfig, uri: &str, skip_post: bool) -> Result<()> {
  let host = Host::open(config, "add").context("Failed to open host")?;

  let report =
    add(&host, uri, &InstallOptions { skip_post }).with_context(|| format!("Failed to add bundle from {uri}"))?;

  print_success(&format!("Installed {}", report.name));
  print_stat("Version", &report.version);
  print_stat("Origin", &report.url);
  print_stat("Identity", short_id(report.identity.as_str()));

  Ok(())
}
