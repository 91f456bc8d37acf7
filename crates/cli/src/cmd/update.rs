//! Implementation of the `tpb update` command.

use anyhow::{Context, Result};

use tpb_lib::config::HostConfig;
use tpb_lib::host::Host;
use tpb_lib::update::{UpdateOptions, update_all};

use crate::output::{print_info, print_stat, print_success, print_warning, short_id};

/// Update every installed bundle.
///
/// Per-bundle failures are reported but do not fail the command.
pub fn cmd_update(config: HostConfig, skip_post: bool) -> Result<()> {
  let host = Host::open(config, "update").context("Failed to open host")?;

  let report = update_all(&host, &UpdateOptions { skip_post }).context("Update failed")?;

  if report.updated.is_empty() && report.failed.is_empty() {
    print_info("No bundles installed");
    return Ok(());
  }

  for failure in &report.failed {
    print_warning(&format!(
      "{} not updated: {}",
      short_id(failure.identity.as_str()),
      failure.reason
    ));
  }
  print_success("Update complete");
  print_stat("Updated", &report.updated.len().to_string());
  print_stat("Failed", &report.failed.len().to_string());

  Ok(())
}
