//! Implementation of the `tpb remove` command.

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use tpb_lib::config::HostConfig;
use tpb_lib::host::Host;
use tpb_lib::remove::{RemovalMode, RemovalOutcome, RemoveOptions, remove};

use crate::output::{print_info, print_success, symbols};

/// Remove the bundle `name` installed from `uri`.
///
/// Deletion problems are warnings; only a failure to republish launchers
/// afterward fails the command.
pub fn cmd_remove(config: HostConfig, uri: &str, name: &str, skip_post: bool) -> Result<()> {
  let host = Host::open(config, "remove").context("Failed to open host")?;

  let report = remove(&host, uri, name, RemovalMode::Interactive, &RemoveOptions { skip_post })
    .with_context(|| format!("Failed to remove {name}"))?;

  if report.removed() == 0 && report.failed() == 0 {
    print_info(&format!("Nothing to remove for {name}"));
    return Ok(());
  }

  for target in &report.targets {
    if target.outcome == RemovalOutcome::Removed {
      println!(
        "  {} {}",
        symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
        target.path.display()
      );
    }
  }
  print_success(&format!("Removed {name}"));

  Ok(())
}
