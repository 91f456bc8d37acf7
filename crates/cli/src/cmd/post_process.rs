//! Implementation of the `tpb post-process` command.
//!
//! Republishes launcher shims for every installed bundle without changing
//! any bundle. Useful after a run with `--skip-post`.

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use tpb_lib::config::HostConfig;
use tpb_lib::host::Host;
use tpb_lib::postprocess;

use crate::output::{print_stat, print_success, symbols};

pub fn cmd_post_process(config: HostConfig) -> Result<()> {
  let host = Host::open(config, "post-process").context("Failed to open host")?;

  let report = postprocess::run(host.layout()).context("Post-processing failed")?;

  for launcher in &report.shims {
    println!(
      "  {} {} {}",
      launcher.name,
      symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      launcher.target.display()
    );
  }
  print_success("Launchers regenerated");
  print_stat("Published", &report.shims.len().to_string());
  print_stat("Skipped", &report.skipped.to_string());

  Ok(())
}
